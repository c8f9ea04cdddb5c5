//! Recording adapters for integration tests.
//!
//! `RecordingSink` captures every `AppEvent` the controller emits; clones
//! share the same log so the test keeps one while the controller thread
//! owns the other.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use washer::app::events::AppEvent;
use washer::app::ports::EventSink;

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.lock().unwrap().contains(event)
    }

    /// Poll until `event` has been emitted or `timeout` elapses.
    pub fn wait_for(&self, event: &AppEvent, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.contains(event) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.lock().unwrap().push(*event);
    }
}

/// Generous bound for cross-thread delivery in tests.
pub const DELIVERY: Duration = Duration::from_secs(2);

/// Bus timing tuned for fast teardown.
pub fn fast_bus_config() -> washer::config::BusConfig {
    washer::config::BusConfig {
        dispatcher_poll_ms: 20,
        ..washer::config::BusConfig::default()
    }
}
