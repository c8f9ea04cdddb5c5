//! Core-pinned thread spawning for the bus dispatcher, the callback worker
//! and the controller.
//!
//! On ESP-IDF, `std::thread` is a pthread over a FreeRTOS task.
//! `esp_pthread_set_cfg()` configures the *next* `pthread_create()` from
//! the calling thread, so the config and the spawn must stay adjacent.
//! Host builds ignore core and priority.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::wait;

type Done = Signal<CriticalSectionRawMutex, ()>;

/// ESP32 cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Core {
    /// Core 0 (PRO_CPU), protocol stacks.
    Pro = 0,
    /// Core 1 (APP_CPU), machine control.
    App = 1,
}

/// Spawn `f` pinned to `core` at `priority` with a `stack_kb` stack.
///
/// `name` must be NUL-terminated (e.g. `"event_dispatcher\0"`).
#[cfg(feature = "espidf")]
pub fn spawn_on_core(
    core: Core,
    priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<TaskHandle> {
    // SAFETY: the config struct is fully initialised by the IDF default
    // constructor and `name` outlives the spawned task.
    let ret = unsafe {
        let mut cfg = esp_idf_sys::esp_create_default_pthread_config();
        cfg.pin_to_core = core as i32;
        cfg.prio = priority as i32;
        cfg.stack_size = (stack_kb * 1024) as i32;
        cfg.thread_name = name.as_ptr() as *const _;
        esp_idf_sys::esp_pthread_set_cfg(&cfg)
    };
    if ret != esp_idf_sys::ESP_OK as i32 {
        return Err(io::Error::other(format!("esp_pthread_set_cfg failed: {ret}")));
    }

    let display_name = name.trim_end_matches('\0');
    log::info!(
        "Spawning '{}' on {:?} (pri={}, stack={}KB)",
        display_name,
        core,
        priority,
        stack_kb
    );

    TaskHandle::spawn(std::thread::Builder::new().name(display_name.into()), f)
}

/// Host fallback.
#[cfg(not(feature = "espidf"))]
pub fn spawn_on_core(
    _core: Core,
    _priority: u8,
    stack_kb: usize,
    name: &'static str,
    f: impl FnOnce() + Send + 'static,
) -> io::Result<TaskHandle> {
    let display_name = name.trim_end_matches('\0');
    log::debug!("Spawning '{}' (host, stack={}KB)", display_name, stack_kb);

    // Host threads need more headroom than the firmware budgets for.
    let stack = (stack_kb * 1024).max(64 * 1024);
    TaskHandle::spawn(
        std::thread::Builder::new()
            .name(display_name.into())
            .stack_size(stack),
        f,
    )
}

/// A spawned thread plus a signal raised when its body returns or
/// unwinds.
pub struct TaskHandle {
    thread: JoinHandle<()>,
    done: Arc<Done>,
}

struct SignalOnExit(Arc<Done>);

impl Drop for SignalOnExit {
    fn drop(&mut self) {
        self.0.signal(());
    }
}

impl TaskHandle {
    fn spawn(builder: std::thread::Builder, f: impl FnOnce() + Send + 'static) -> io::Result<Self> {
        let done = Arc::new(Done::new());
        let on_exit = SignalOnExit(done.clone());
        let thread = builder.spawn(move || {
            let _on_exit = on_exit;
            f();
        })?;
        Ok(Self { thread, done })
    }
}

/// Wait up to `timeout` for `handle` to finish.  Returns `false` (and
/// leaves the thread detached) if it is still running.
pub fn join_bounded(handle: TaskHandle, timeout: Duration) -> bool {
    if wait::block_on_timeout(handle.done.wait(), timeout).is_none() {
        return false;
    }
    // Only the exit guard's drop is left to run.
    let _ = handle.thread.join();
    true
}
