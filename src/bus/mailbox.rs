//! Per-consumer bounded delivery queues.
//!
//! A [`Mailbox`] is what a consumer hands to the bus when it subscribes.
//! The bus only sees it through the object-safe [`DeliveryTarget`] trait,
//! so consumers can pick their own queue depth at compile time.
//!
//! ```text
//!   dispatcher ──deliver()──▶ ┌───────────────┐ ──recv()──▶ consumer thread
//!   (blocks when full)        │ Mailbox<N>    │
//!   callback   ──offer()────▶ │ embassy chan  │
//!   (drops when full)         └───────────────┘
//! ```

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::events::Event;
use crate::wait;

/// Anything the bus can push events into.
pub trait DeliveryTarget: Send + Sync {
    /// Queue depth.  A zero-capacity target cannot receive anything and is
    /// rejected at subscription time.
    fn capacity(&self) -> usize;

    /// Push a copy of `event`, blocking the caller for as long as the
    /// queue is full.
    fn deliver(&self, event: Event);

    /// Push without blocking.  Returns `false` if the queue was full and
    /// the event was not stored.
    fn offer(&self, event: Event) -> bool;
}

/// Bounded FIFO of events owned by one consumer.
pub struct Mailbox<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, Event, N>,
}

impl<const N: usize> Mailbox<N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Wait for the next event (for use inside a `select`-style race).
    pub async fn receive(&self) -> Event {
        self.channel.receive().await
    }

    /// Block until an event arrives.
    pub fn recv(&self) -> Event {
        wait::block_on(self.channel.receive())
    }

    /// Block until an event arrives or `timeout` elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        if let Ok(event) = self.channel.try_receive() {
            return Some(event);
        }
        wait::block_on_timeout(self.channel.receive(), timeout)
    }

    pub fn try_recv(&self) -> Option<Event> {
        self.channel.try_receive().ok()
    }

    /// Pending events.
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Discard everything pending.
    pub fn clear(&self) {
        self.channel.clear();
    }
}

impl<const N: usize> Default for Mailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DeliveryTarget for Mailbox<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn deliver(&self, event: Event) {
        if let Err(embassy_sync::channel::TrySendError::Full(event)) = self.channel.try_send(event) {
            wait::block_on(self.channel.send(event));
        }
    }

    fn offer(&self, event: Event) -> bool {
        self.channel.try_send(event).is_ok()
    }
}
