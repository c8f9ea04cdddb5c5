//! Process-wide publish/subscribe event bus.
//!
//! Two dispatch strategies share the same event model and the same
//! [`EventBus`] seam; the firmware image instantiates exactly one of them,
//! chosen at build time through [`DefaultBus`].
//!
//! ```text
//!                      ┌─────────────────── mode A: QueuedBus ───────────────────┐
//!  publish() ──▶ central queue ──▶ dispatcher thread ──▶ Mailbox (per consumer)  │
//!                      │            (blocks on full mailbox, never drops)        │
//!                      └─────────────────────────────────────────────────────────┘
//!                      ┌────────────────── mode B: CallbackBus ──────────────────┐
//!  publish() ──▶ scan handler table ──▶ WorkSlab slot ──▶ worker thread runs     │
//!                      │               (drops + logs when the slab is empty)     │
//!                      └─────────────────────────────────────────────────────────┘
//! ```

pub mod callback;
pub mod mailbox;
pub mod queued;
pub mod registry;

use std::sync::Arc;

use crate::error::Result;
use crate::events::{Event, EventId, Payload};

pub use callback::CallbackBus;
pub use mailbox::{DeliveryTarget, Mailbox};
pub use queued::QueuedBus;
pub use registry::{InterestSet, SubscriptionHandle};

#[cfg(all(feature = "dispatch-queued", feature = "dispatch-callback"))]
compile_error!("features `dispatch-queued` and `dispatch-callback` are mutually exclusive");

/// The dispatcher the firmware image runs.
#[cfg(not(feature = "dispatch-callback"))]
pub type DefaultBus = QueuedBus;

/// The dispatcher the firmware image runs.
#[cfg(feature = "dispatch-callback")]
pub type DefaultBus = CallbackBus;

// ---------------------------------------------------------------------------
// Handler capability (callback mode)
// ---------------------------------------------------------------------------

/// Something that reacts to delivered events on the bus worker thread.
///
/// Implemented for every `Fn(&Event) + Send + Sync` closure.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn handle(&self, event: &Event) {
        self(event);
    }
}

// ---------------------------------------------------------------------------
// Common seam
// ---------------------------------------------------------------------------

/// How a consumer ended up attached to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    /// Queued mode: a registry slot that can later be released.
    Subscription(SubscriptionHandle),
    /// Callback mode: index of the handler-table entry.  The entry is
    /// never reused; detaching only deactivates it.
    Handler(usize),
}

/// What producers and consumers need from either dispatcher.
pub trait EventBus: Send + Sync {
    /// Stamp the sender and hand `event` to the dispatcher.
    fn publish(&self, event: Event) -> Result<()>;

    /// Route every event in `interests` to `target`.
    fn attach(&self, target: Arc<dyn DeliveryTarget>, interests: &[EventId]) -> Result<Attachment>;

    /// Stop routing to a consumer that is going away.  Must be called
    /// before the consumer stops draining its mailbox, or the queued
    /// dispatcher will eventually block on it.
    fn detach(&self, attachment: Attachment) -> Result<()>;

    /// Publish by raw ordinal, as the console and tests do.
    fn publish_raw(&self, raw_id: u16, payload: Payload) -> Result<()> {
        let id = EventId::try_from(raw_id)?;
        self.publish(Event::new(id, payload))
    }
}

impl<B: EventBus + ?Sized> EventBus for Arc<B> {
    fn publish(&self, event: Event) -> Result<()> {
        (**self).publish(event)
    }

    fn attach(&self, target: Arc<dyn DeliveryTarget>, interests: &[EventId]) -> Result<Attachment> {
        (**self).attach(target, interests)
    }

    fn detach(&self, attachment: Attachment) -> Result<()> {
        (**self).detach(attachment)
    }
}
