//! Queued dispatch (mode A).
//!
//! One central bounded queue, drained by one dispatcher thread that fans
//! each event out to the mailbox of every matching subscription.
//!
//! ```text
//!  producer ─┐                                   ┌──▶ Mailbox A
//!  producer ─┼──▶ central queue (32) ──▶ dispatch ┼──▶ Mailbox B   (blocks while full)
//!  producer ─┘     bounded publish wait          └──▶ Mailbox C
//!                                     registry lock held for the whole pass
//! ```
//!
//! Ordering: a single queue feeding a single dispatcher keeps every
//! subscriber's stream in publish order.  A full mailbox stalls the whole
//! dispatcher instead of dropping; publishers only ever wait on the
//! central queue.

use core::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, error, info, warn};

use super::mailbox::DeliveryTarget;
use super::registry::{InterestSet, SubscriptionHandle, SubscriptionRegistry};
use super::{Attachment, EventBus};
use crate::config::{BusConfig, CENTRAL_QUEUE_CAPACITY};
use crate::drivers::task_pin::{self, Core, TaskHandle};
use crate::error::{BusError, Result};
use crate::events::{Event, EventId};
use crate::wait::{self, millis};

type RegistryGuard<'a> = MutexGuard<'a, CriticalSectionRawMutex, SubscriptionRegistry>;

/// State shared between the bus handle and its dispatcher thread.
struct Shared {
    config: BusConfig,
    central: Channel<CriticalSectionRawMutex, Event, CENTRAL_QUEUE_CAPACITY>,
    registry: Mutex<CriticalSectionRawMutex, SubscriptionRegistry>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    /// Delivery passes abandoned because the registry lock timed out.
    abandoned: AtomicU32,
}

impl Shared {
    fn lock_registry(&self) -> Option<RegistryGuard<'_>> {
        if let Ok(guard) = self.registry.try_lock() {
            return Some(guard);
        }
        wait::block_on_timeout(self.registry.lock(), millis(self.config.lock_timeout_ms))
    }

    /// One fan-out pass.  Returns how many mailboxes received the event.
    fn dispatch(&self, event: Event) -> usize {
        let Some(registry) = self.lock_registry() else {
            self.abandoned.fetch_add(1, Ordering::Relaxed);
            error!(
                "Dispatcher: registry lock timed out, abandoning delivery of {}",
                event.id
            );
            return 0;
        };

        let mut delivered = 0;
        for target in registry.matching(event.id) {
            target.deliver(event);
            delivered += 1;
        }
        debug!("Dispatcher: {} -> {} subscriber(s)", event.id, delivered);
        delivered
    }
}

enum Wake {
    Event(Event),
    Stop,
}

fn run_dispatcher(shared: &Shared) {
    info!("Dispatcher thread started");
    let poll = millis(shared.config.dispatcher_poll_ms);

    while !shared.stop.signaled() {
        let wake = wait::block_on_timeout(
            future::or(async { Wake::Event(shared.central.receive().await) }, async {
                shared.stop.wait().await;
                Wake::Stop
            }),
            poll,
        );
        match wake {
            Some(Wake::Event(event)) => {
                shared.dispatch(event);
            }
            Some(Wake::Stop) => break,
            // Periodic wake: loop back and re-check the stop flag.
            None => {}
        }
    }
    info!("Dispatcher thread exiting");
}

// ---------------------------------------------------------------------------
// QueuedBus
// ---------------------------------------------------------------------------

/// Mode A event bus.  Dropping it shuts the dispatcher down.
pub struct QueuedBus {
    shared: Arc<Shared>,
    dispatcher: Option<TaskHandle>,
}

impl QueuedBus {
    /// Create an empty registry and queue and start the dispatcher thread.
    pub fn start(config: BusConfig) -> Result<Self> {
        let priority = config.dispatcher_priority;
        let stack_kb = config.dispatcher_stack_kb;
        let shared = Arc::new(Shared {
            config,
            central: Channel::new(),
            registry: Mutex::new(SubscriptionRegistry::new()),
            stop: Signal::new(),
            abandoned: AtomicU32::new(0),
        });

        let worker = shared.clone();
        let dispatcher = task_pin::spawn_on_core(
            Core::App,
            priority,
            stack_kb,
            "event_dispatcher\0",
            move || run_dispatcher(&worker),
        )
        .map_err(|e| {
            error!("Failed to create event dispatcher thread: {}", e);
            BusError::Spawn
        })?;

        info!("Event bus initialised (queued dispatch)");
        Ok(Self {
            shared,
            dispatcher: Some(dispatcher),
        })
    }

    /// Stamp the sender and enqueue on the central queue, waiting at most
    /// `publish_timeout_ms` for space.
    pub fn publish(&self, event: Event) -> Result<()> {
        let event = event.stamped();
        match self.shared.central.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                let timeout = millis(self.shared.config.publish_timeout_ms);
                wait::block_on_timeout(self.shared.central.send(event), timeout).ok_or_else(|| {
                    error!("Failed to publish {}: central queue full", event.id);
                    BusError::QueueFull
                })
            }
        }
    }

    /// Register `target` for every id in `interests`.
    pub fn subscribe(
        &self,
        target: Arc<dyn DeliveryTarget>,
        interests: &[EventId],
    ) -> Result<SubscriptionHandle> {
        let interest = InterestSet::new(interests).inspect_err(|e| {
            error!("Invalid arguments for subscription: {}", e);
        })?;
        let mut registry = self.shared.lock_registry().ok_or_else(|| {
            error!("Failed to lock subscription registry for subscribing");
            BusError::LockTimeout
        })?;
        registry.insert(target, interest)
    }

    /// Release a subscription.  Events already sitting in its mailbox stay
    /// there; nothing new is routed to it afterwards.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> Result<()> {
        let mut registry = self.shared.lock_registry().ok_or_else(|| {
            error!("Failed to lock subscription registry for unsubscribing");
            BusError::LockTimeout
        })?;
        registry.remove(handle)
    }

    /// Active subscriptions, or `None` if the registry lock timed out.
    pub fn subscription_count(&self) -> Option<usize> {
        self.shared.lock_registry().map(|r| r.active_count())
    }

    /// Events waiting in the central queue.
    pub fn pending(&self) -> usize {
        self.shared.central.len()
    }

    /// Delivery passes abandoned on registry lock timeout since start.
    pub fn abandoned_deliveries(&self) -> u32 {
        self.shared.abandoned.load(Ordering::Relaxed)
    }

    /// Signal the dispatcher to stop and wait up to `shutdown_join_ms` for
    /// it.  A dispatcher stuck on a full mailbox is detached.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.dispatcher.take() else {
            return;
        };
        self.shared.stop.signal(());

        if task_pin::join_bounded(handle, millis(self.shared.config.shutdown_join_ms)) {
            info!("Event bus de-initialised");
        } else {
            warn!(
                "Dispatcher did not stop within {} ms (blocked on a full mailbox?); detaching",
                self.shared.config.shutdown_join_ms
            );
        }
    }
}

impl Drop for QueuedBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EventBus for QueuedBus {
    fn publish(&self, event: Event) -> Result<()> {
        QueuedBus::publish(self, event)
    }

    fn attach(&self, target: Arc<dyn DeliveryTarget>, interests: &[EventId]) -> Result<Attachment> {
        self.subscribe(target, interests).map(Attachment::Subscription)
    }

    fn detach(&self, attachment: Attachment) -> Result<()> {
        match attachment {
            Attachment::Subscription(handle) => self.unsubscribe(handle),
            Attachment::Handler(_) => Err(BusError::InvalidArgument("not a queued-bus subscription")),
        }
    }
}
