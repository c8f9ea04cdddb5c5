//! System configuration parameters
//!
//! Capacities are compile-time constants: pools and queues are sized once
//! and never grow.  Timing knobs live in [`BusConfig`] / [`DeviceConfig`]
//! and are fixed when the bus is started.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// --- Bus capacities ---

/// Subscription pool size (queued dispatch).
pub const MAX_SUBSCRIPTIONS: usize = 16;
/// Maximum event ids in one subscription's interest set.
pub const MAX_EVENTS_PER_SUBSCRIPTION: usize = 24;
/// Depth of the central publish queue.
pub const CENTRAL_QUEUE_CAPACITY: usize = 32;
/// Handler table size (callback dispatch).
pub const MAX_HANDLERS: usize = 16;
/// Deferred work items that may be in flight at once (callback dispatch).
pub const WORK_SLAB_CAPACITY: usize = 16;

// --- Consumer queue depths ---

/// Depth of the FSM controller's mailbox.
pub const CONTROLLER_QUEUE_DEPTH: usize = 16;
/// Depth of a sensor thread's mailbox.
pub const SENSOR_QUEUE_DEPTH: usize = 8;

/// Event bus timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Bounded wait for space in the central queue (milliseconds).
    pub publish_timeout_ms: u32,
    /// Bounded wait for the subscription registry lock (milliseconds).
    pub lock_timeout_ms: u32,
    /// Dispatcher wake period used to observe shutdown (milliseconds).
    pub dispatcher_poll_ms: u32,
    /// How long shutdown waits for a bus thread to exit (milliseconds).
    pub shutdown_join_ms: u32,
    /// Priority for the dispatcher / worker thread.
    pub dispatcher_priority: u8,
    /// Stack for the dispatcher / worker thread (KiB).
    pub dispatcher_stack_kb: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            publish_timeout_ms: 100,
            lock_timeout_ms: 500,
            dispatcher_poll_ms: 500,
            shutdown_join_ms: 1000,
            dispatcher_priority: 5,
            dispatcher_stack_kb: 4,
        }
    }
}

/// Device-level configuration for the simulator / firmware image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub bus: BusConfig,
    /// Door sensor poll interval (milliseconds).
    pub door_poll_interval_ms: u32,
    /// Water level sensor poll interval (milliseconds).
    pub water_poll_interval_ms: u32,
    /// Priority for the FSM controller thread.
    pub controller_priority: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            door_poll_interval_ms: 100, // 10 Hz
            water_poll_interval_ms: 100,
            controller_priority: 5,
        }
    }
}

impl DeviceConfig {
    /// Reject values that would stall or spin the bus threads.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bus = &self.bus;
        if bus.publish_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("bus.publish_timeout_ms must be > 0"));
        }
        if bus.lock_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("bus.lock_timeout_ms must be > 0"));
        }
        if bus.dispatcher_poll_ms == 0 {
            return Err(ConfigError::ValidationFailed("bus.dispatcher_poll_ms must be > 0"));
        }
        if bus.dispatcher_stack_kb == 0 {
            return Err(ConfigError::ValidationFailed("bus.dispatcher_stack_kb must be > 0"));
        }
        if self.door_poll_interval_ms == 0 || self.water_poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("sensor poll intervals must be > 0"));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|_| ConfigError::Corrupted)?;
        config.validate()?;
        Ok(config)
    }
}
