//! Subscription registry: a fixed pool of slots addressed by generational
//! handles.
//!
//! ```text
//! ┌──────┬────────────┬─────────────────────────────┬────────────────┐
//! │ slot │ generation │ target                      │ interest       │
//! ├──────┼────────────┼─────────────────────────────┼────────────────┤
//! │  0   │     3      │ Arc<dyn DeliveryTarget>     │ [DoorOpened..] │
//! │  1   │     0      │ (free)                      │                │
//! │ ...  │            │                             │                │
//! └──────┴────────────┴─────────────────────────────┴────────────────┘
//! ```
//!
//! Freeing a slot bumps its generation, so a handle kept past
//! `unsubscribe` can never address whoever reuses the slot.  The registry
//! itself is plain data; the bus wraps it in a single lock that covers
//! every read, write and delivery pass.

use std::sync::Arc;

use log::info;

use super::mailbox::DeliveryTarget;
use crate::config::{MAX_EVENTS_PER_SUBSCRIPTION, MAX_SUBSCRIPTIONS};
use crate::error::{BusError, Result};
use crate::events::EventId;

// ---------------------------------------------------------------------------
// Interest set
// ---------------------------------------------------------------------------

/// Non-empty, bounded set of event ids a consumer wants.  Fixed once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestSet(heapless::Vec<EventId, MAX_EVENTS_PER_SUBSCRIPTION>);

impl InterestSet {
    pub fn new(ids: &[EventId]) -> Result<Self> {
        if ids.is_empty() {
            return Err(BusError::InvalidArgument("empty interest set"));
        }
        let set = heapless::Vec::from_slice(ids)
            .map_err(|_| BusError::InvalidArgument("too many events in interest set"))?;
        Ok(Self(set))
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[EventId] {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Handles and slots
// ---------------------------------------------------------------------------

/// Opaque reference to one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    index: u8,
    generation: u32,
}

impl SubscriptionHandle {
    /// Pool slot this handle addresses (diagnostics only).
    pub fn slot(self) -> usize {
        self.index as usize
    }
}

struct Subscription {
    target: Arc<dyn DeliveryTarget>,
    interest: InterestSet,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    /// `None` = inactive, free for reuse.
    entry: Option<Subscription>,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct SubscriptionRegistry {
    slots: [Slot; MAX_SUBSCRIPTIONS],
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::default()),
        }
    }

    /// Claim the first free slot for `target`.
    pub fn insert(
        &mut self,
        target: Arc<dyn DeliveryTarget>,
        interest: InterestSet,
    ) -> Result<SubscriptionHandle> {
        if target.capacity() == 0 {
            return Err(BusError::InvalidArgument("empty delivery target"));
        }

        let Some((index, slot)) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.entry.is_none())
        else {
            return Err(BusError::CapacityExceeded("subscription pool"));
        };

        info!(
            "Registry: slot {} subscribed to {} event(s)",
            index,
            interest.len()
        );
        slot.entry = Some(Subscription { target, interest });
        Ok(SubscriptionHandle {
            index: index as u8,
            generation: slot.generation,
        })
    }

    /// Release the slot behind `handle`.  Events already queued in the
    /// target are left alone.
    pub fn remove(&mut self, handle: SubscriptionHandle) -> Result<()> {
        let slot = self
            .slots
            .get_mut(handle.slot())
            .ok_or(BusError::InvalidArgument("subscription handle out of range"))?;

        if slot.generation != handle.generation || slot.entry.is_none() {
            return Err(BusError::InvalidArgument("stale subscription handle"));
        }

        slot.entry = None;
        slot.generation = slot.generation.wrapping_add(1);
        info!("Registry: slot {} unsubscribed", handle.slot());
        Ok(())
    }

    /// Targets of every active subscription interested in `id`, in slot order.
    pub fn matching(&self, id: EventId) -> impl Iterator<Item = &Arc<dyn DeliveryTarget>> {
        self.slots.iter().filter_map(move |slot| match &slot.entry {
            Some(sub) if sub.interest.contains(id) => Some(&sub.target),
            _ => None,
        })
    }

    pub fn is_active(&self, handle: SubscriptionHandle) -> bool {
        self.slots
            .get(handle.slot())
            .is_some_and(|slot| slot.generation == handle.generation && slot.entry.is_some())
    }

    /// Number of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    /// Deactivate every slot (bus re-initialisation).
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.entry.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
