//! Door switch: poller (producer) and state monitor (consumer).
//!
//! The switch reads HIGH when the door is closed.  [`DoorSensor`] publishes
//! `DoorClosed` / `DoorOpened` only when the level changes, with the uptime
//! in milliseconds as payload.  [`DoorMonitor`] subscribes to the door
//! events and remembers the last one seen.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_io_mini::Timer;
use embedded_hal::digital::InputPin;
use log::{info, warn};

use super::uptime_ms;
use crate::bus::{Attachment, EventBus, Mailbox};
use crate::config::SENSOR_QUEUE_DEPTH;
use crate::error::Result;
use crate::events::{Event, EventId, Payload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
}

impl DoorState {
    const fn from_level(high: bool) -> Self {
        if high { Self::Closed } else { Self::Open }
    }

    pub const fn event_id(self) -> EventId {
        match self {
            Self::Open => EventId::DoorOpened,
            Self::Closed => EventId::DoorClosed,
        }
    }
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

pub struct DoorSensor<P> {
    pin: P,
    last: DoorState,
}

impl<P: InputPin> DoorSensor<P> {
    /// Seed the last-known state from the pin so start-up is not reported
    /// as a change.  An unreadable pin is assumed open.
    pub fn new(mut pin: P) -> Self {
        let last = match pin.is_high() {
            Ok(high) => DoorState::from_level(high),
            Err(e) => {
                warn!("Door pin unreadable at init ({:?}); assuming open", e);
                DoorState::Open
            }
        };
        Self { pin, last }
    }

    pub fn state(&self) -> DoorState {
        self.last
    }

    /// Sample once and publish on change.  A failed publish leaves the
    /// old state in place so the next poll retries it.
    pub fn poll<B: EventBus + ?Sized>(&mut self, bus: &B, uptime_ms: u32) -> Option<DoorState> {
        let high = match self.pin.is_high() {
            Ok(high) => high,
            Err(e) => {
                warn!("Door pin read failed: {:?}", e);
                return None;
            }
        };
        let current = DoorState::from_level(high);
        if current == self.last {
            return None;
        }

        let event = Event::new(current.event_id(), Payload::from_u32(uptime_ms));
        info!("Door sensor posting {}", event.id);
        if let Err(e) = bus.publish(event) {
            warn!("Door sensor failed to publish {}: {}", event.id, e);
            return None;
        }
        self.last = current;
        Some(current)
    }

    /// Poll every `interval` until `stop` is raised.
    pub async fn run<B: EventBus + ?Sized>(
        &mut self,
        bus: &B,
        interval: Duration,
        boot: Instant,
        stop: &AtomicBool,
    ) {
        while !stop.load(Ordering::Acquire) {
            self.poll(bus, uptime_ms(boot));
            Timer::after(interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Events the monitor listens to.
pub const DOOR_EVENTS: [EventId; 3] = [
    EventId::DoorOpened,
    EventId::DoorClosed,
    EventId::TestDoorInput,
];

pub struct DoorMonitor {
    mailbox: Arc<Mailbox<SENSOR_QUEUE_DEPTH>>,
    attachment: Attachment,
    last: AtomicU16,
}

impl DoorMonitor {
    pub fn attach<B: EventBus + ?Sized>(bus: &B) -> Result<Arc<Self>> {
        let mailbox = Arc::new(Mailbox::new());
        let attachment = bus.attach(mailbox.clone(), &DOOR_EVENTS)?;
        Ok(Arc::new(Self {
            mailbox,
            attachment,
            last: AtomicU16::new(EventId::Unknown.ordinal()),
        }))
    }

    /// Pass to [`EventBus::detach`] once the monitor stops draining.
    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    /// Last door event received, `Unknown` before the first.
    pub fn last_event(&self) -> EventId {
        EventId::try_from(self.last.load(Ordering::Acquire)).unwrap_or(EventId::Unknown)
    }

    /// Drain everything already delivered.  Returns how many were handled.
    pub fn drain(&self) -> usize {
        let mut n = 0;
        while let Some(event) = self.mailbox.try_recv() {
            self.record(&event);
            n += 1;
        }
        n
    }

    /// Consume events until `stop` is raised (checked once per event or
    /// per `poll` period).
    pub async fn run(&self, poll: Duration, stop: &AtomicBool) {
        while !stop.load(Ordering::Acquire) {
            let received = futures_lite::future::or(
                async { Some(self.mailbox.receive().await) },
                async {
                    Timer::after(poll).await;
                    None
                },
            )
            .await;
            if let Some(event) = received {
                self.record(&event);
            }
        }
    }

    fn record(&self, event: &Event) {
        info!("Door monitor received {}", event.id);
        self.last.store(event.id.ordinal(), Ordering::Release);
    }
}
