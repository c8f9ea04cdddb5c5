//! Blocking waits over `embassy-sync` futures.
//!
//! Bus threads are plain OS threads, but the queues and the registry lock
//! are async primitives.  These helpers park the calling thread on a
//! future with `futures_lite::future::block_on`; bounded waits race the
//! future against an `async_io_mini::Timer`.

use core::future::Future;
use core::time::Duration;

use futures_lite::future;

/// Park the calling thread until `fut` completes.
pub fn block_on<F: Future>(fut: F) -> F::Output {
    future::block_on(fut)
}

/// Park the calling thread until `fut` completes or `timeout` elapses.
///
/// Returns `None` on timeout; `fut` is dropped unfinished, so it must be
/// cancel-safe (the embassy channel and mutex futures are).
pub fn block_on_timeout<F: Future>(fut: F, timeout: Duration) -> Option<F::Output> {
    future::block_on(future::or(async { Some(fut.await) }, async {
        async_io_mini::Timer::after(timeout).await;
        None
    }))
}

/// Convenience for config fields expressed in milliseconds.
pub const fn millis(ms: u32) -> Duration {
    Duration::from_millis(ms as u64)
}
