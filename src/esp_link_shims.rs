//! Link-time symbols that `critical-section` and `embassy-time` expect the
//! platform to provide.
//!
//! On the host both come from crate features (`critical-section/std` and
//! `embassy-time/std`).  Under ESP-IDF they are supplied here: the
//! critical section is a process-wide mutex held re-entrantly per thread,
//! and the time driver reads `esp_timer` and wakes timers from a helper
//! thread.  `async_io_mini::Timer`, and with it every bounded bus wait,
//! sits on this driver.

use core::cell::{Cell, RefCell};
use core::ffi::c_void;
use core::task::Waker;
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::error;

static BUS_CRITICAL_SECTION: Mutex<()> = Mutex::new(());

thread_local! {
    static NESTING: Cell<u8> = const { Cell::new(0) };
    static HELD: RefCell<Option<MutexGuard<'static, ()>>> = const { RefCell::new(None) };
}

// ── critical-section 1.x ──────────────────────────────────────

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_acquire() -> u8 {
    NESTING.with(|nesting| {
        let depth = nesting.get();
        if depth == 0 {
            // A panic inside a section cannot leave the unit data torn.
            let guard = BUS_CRITICAL_SECTION
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            HELD.with(|held| *held.borrow_mut() = Some(guard));
        }
        let depth = depth.saturating_add(1);
        nesting.set(depth);
        depth
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn _critical_section_1_0_release(_token: u8) {
    NESTING.with(|nesting| match nesting.get() {
        0 => {}
        1 => {
            nesting.set(0);
            HELD.with(|held| *held.borrow_mut() = None);
        }
        depth => nesting.set(depth - 1),
    })
}

// ── embassy-time driver ───────────────────────────────────────

/// Microseconds since boot; matches the default 1 MHz tick rate.
#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_now() -> u64 {
    // SAFETY: plain read of the monotonic high-resolution timer.
    let now = unsafe { esp_idf_sys::esp_timer_get_time() };
    u64::try_from(now).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn _embassy_time_schedule_wake(at: u64, waker: *mut c_void) {
    if waker.is_null() {
        return;
    }
    // SAFETY: embassy-time hands over a `&Waker` that is valid for this
    // call only; it is cloned before returning.
    let waker = unsafe { &*(waker as *const Waker) }.clone();
    let fallback = waker.clone();
    let spawned = std::thread::Builder::new()
        .name("time-wake".into())
        .stack_size(4096)
        .spawn(move || {
            let now = _embassy_time_now();
            if at > now {
                std::thread::sleep(Duration::from_micros(at - now));
            }
            waker.wake();
        });
    if let Err(e) = spawned {
        error!("Failed to start timer wake thread: {}", e);
        // Early wake-up: the timer sees it has not expired and re-arms.
        fallback.wake();
    }
}
