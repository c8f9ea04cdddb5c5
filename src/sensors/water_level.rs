//! Drum water level switch.
//!
//! Reads HIGH when the drum is full.  Every level change publishes
//! `WaterLevelChanged` with the new level as a `bool` payload; a change
//! to full additionally publishes `WaterLevelReached`, the trigger the
//! wash cycle waits for while filling.  A `WaterLevelReached` the bus
//! refused is retried on every poll until it goes out or the drum drains.

use core::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_io_mini::Timer;
use embedded_hal::digital::InputPin;
use log::{info, warn};

use crate::bus::EventBus;
use crate::events::{Event, EventId, Payload};

pub struct WaterLevelSensor<P> {
    pin: P,
    full: bool,
    reached_pending: bool,
}

impl<P: InputPin> WaterLevelSensor<P> {
    /// The drum is assumed empty if the pin cannot be read.
    pub fn new(mut pin: P) -> Self {
        let full = pin.is_high().unwrap_or_else(|e| {
            warn!("Water level pin unreadable at init ({:?}); assuming empty", e);
            false
        });
        Self {
            pin,
            full,
            reached_pending: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Sample once.  Returns the new level if it changed.
    ///
    /// The level is only committed once `WaterLevelChanged` is accepted,
    /// so a refused publish is repeated on the next poll.
    pub fn poll<B: EventBus + ?Sized>(&mut self, bus: &B) -> Option<bool> {
        let full = match self.pin.is_high() {
            Ok(level) => level,
            Err(e) => {
                warn!("Water level pin read failed: {:?}", e);
                return None;
            }
        };

        let mut changed_to = None;
        if full != self.full {
            let changed = Event::new(EventId::WaterLevelChanged, Payload::from_bool(full));
            if let Err(e) = bus.publish(changed) {
                warn!("Failed to publish {}: {}", changed.id, e);
                return None;
            }
            self.full = full;
            self.reached_pending = full;
            changed_to = Some(full);
            info!("Water level: {}", if full { "FULL" } else { "EMPTY" });
        }

        if self.reached_pending {
            let reached = Event::signal(EventId::WaterLevelReached);
            match bus.publish(reached) {
                Ok(()) => self.reached_pending = false,
                Err(e) => warn!("Failed to publish {} (will retry): {}", reached.id, e),
            }
        }
        changed_to
    }

    /// Poll every `interval` until `stop` is raised.
    pub async fn run<B: EventBus + ?Sized>(&mut self, bus: &B, interval: Duration, stop: &AtomicBool) {
        while !stop.load(Ordering::Acquire) {
            self.poll(bus);
            Timer::after(interval).await;
        }
    }
}
