//! Callback dispatch (mode B).
//!
//! Publishing scans a handler table and, for every handler interested in
//! the event, claims a slot from a fixed work-item slab and hands the item
//! to a single worker thread that runs the handler.
//!
//! ```text
//!  publish(ev) ──▶ handler table ──match──▶ WorkSlab::claim() ──▶ work queue ──▶ worker
//!                  (append-only)             │ none left?                         │
//!                                            └──▶ drop + warn                     ▼
//!                                                                   handler.handle(&ev)
//!                                                                   slot released on drop
//! ```
//!
//! Handlers never run on the publishing thread.  Nothing here blocks the
//! publisher: an exhausted slab loses that one delivery.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, error, info, warn};

use super::mailbox::DeliveryTarget;
use super::registry::InterestSet;
use super::{Attachment, EventBus, EventHandler};
use crate::config::{BusConfig, MAX_HANDLERS, WORK_SLAB_CAPACITY};
use crate::drivers::task_pin::{self, Core, TaskHandle};
use crate::error::{BusError, Result};
use crate::events::{Event, EventId};
use crate::wait::{self, millis};

// ---------------------------------------------------------------------------
// Work-item slab
// ---------------------------------------------------------------------------

/// Counts deferred deliveries in flight.  Never exceeds
/// [`WORK_SLAB_CAPACITY`].
struct WorkSlab {
    in_use: AtomicUsize,
}

impl WorkSlab {
    const fn new() -> Self {
        Self {
            in_use: AtomicUsize::new(0),
        }
    }

    fn claim(self: &Arc<Self>) -> Option<WorkSlot> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < WORK_SLAB_CAPACITY).then_some(n + 1)
            })
            .ok()
            .map(|_| WorkSlot { slab: self.clone() })
    }

    fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }
}

/// One claimed slab entry; returned when dropped.
struct WorkSlot {
    slab: Arc<WorkSlab>,
}

impl Drop for WorkSlot {
    fn drop(&mut self) {
        self.slab.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

struct WorkItem {
    handler: Arc<dyn EventHandler>,
    event: Event,
    _slot: WorkSlot,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct Registration {
    handler: Arc<dyn EventHandler>,
    interest: InterestSet,
    /// Cleared by `deactivate`; the slot itself is never reused.
    active: bool,
}

type HandlerTable = heapless::Vec<Registration, MAX_HANDLERS>;

struct Shared {
    config: BusConfig,
    handlers: BlockingMutex<CriticalSectionRawMutex, RefCell<HandlerTable>>,
    slab: Arc<WorkSlab>,
    // Sized to the slab, so a claimed slot always finds room here.
    work: Channel<CriticalSectionRawMutex, WorkItem, WORK_SLAB_CAPACITY>,
    stop: Signal<CriticalSectionRawMutex, ()>,
    dropped: AtomicU32,
}

enum Wake {
    Item(WorkItem),
    Stop,
}

fn run_worker(shared: &Shared) {
    info!("Bus worker thread started");
    let poll = millis(shared.config.dispatcher_poll_ms);

    while !shared.stop.signaled() {
        let wake = wait::block_on_timeout(
            future::or(async { Wake::Item(shared.work.receive().await) }, async {
                shared.stop.wait().await;
                Wake::Stop
            }),
            poll,
        );
        match wake {
            Some(Wake::Item(item)) => {
                item.handler.handle(&item.event);
                // `item` dropped here: slot back in the slab.
            }
            Some(Wake::Stop) => break,
            None => {}
        }
    }
    info!("Bus worker thread exiting");
}

// ---------------------------------------------------------------------------
// CallbackBus
// ---------------------------------------------------------------------------

/// Mode B event bus.  Dropping it shuts the worker down.
pub struct CallbackBus {
    shared: Arc<Shared>,
    worker: Option<TaskHandle>,
}

impl CallbackBus {
    /// Create an empty handler table and slab and start the worker thread.
    pub fn start(config: BusConfig) -> Result<Self> {
        let priority = config.dispatcher_priority;
        let stack_kb = config.dispatcher_stack_kb;
        let shared = Arc::new(Shared {
            config,
            handlers: BlockingMutex::new(RefCell::new(heapless::Vec::new())),
            slab: Arc::new(WorkSlab::new()),
            work: Channel::new(),
            stop: Signal::new(),
            dropped: AtomicU32::new(0),
        });

        let worker_shared = shared.clone();
        let worker = task_pin::spawn_on_core(
            Core::App,
            priority,
            stack_kb,
            "bus_worker\0",
            move || run_worker(&worker_shared),
        )
        .map_err(|e| {
            error!("Failed to create bus worker thread: {}", e);
            BusError::Spawn
        })?;

        info!("Event bus initialised (callback dispatch)");
        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Append `handler` to the table for every id in `interests`.
    /// Returns its table index.  Registrations live as long as the bus.
    pub fn register_handler(
        &self,
        handler: impl EventHandler + 'static,
        interests: &[EventId],
    ) -> Result<usize> {
        let interest = InterestSet::new(interests)?;
        let registration = Registration {
            handler: Arc::new(handler),
            interest,
            active: true,
        };
        self.shared.handlers.lock(|table| {
            let mut table = table.borrow_mut();
            table
                .push(registration)
                .map_err(|_| BusError::CapacityExceeded("handler table"))?;
            let index = table.len() - 1;
            info!("Handler {} registered for {} event(s)", index, interests.len());
            Ok(index)
        })
    }

    /// Stop running the handler at `index`.  Its table entry stays
    /// occupied.  Work items already queued for it still run.
    pub fn deactivate(&self, index: usize) -> Result<()> {
        self.shared.handlers.lock(|table| {
            let mut table = table.borrow_mut();
            let entry = table
                .get_mut(index)
                .filter(|r| r.active)
                .ok_or(BusError::InvalidArgument("no active handler at index"))?;
            entry.active = false;
            info!("Handler {} deactivated", index);
            Ok(())
        })
    }

    /// Queue one work item per interested handler.
    ///
    /// Every matching handler is attempted.  If the slab ran dry for any
    /// of them the call reports `CapacityExceeded`; the others are still
    /// delivered.
    pub fn publish(&self, event: Event) -> Result<()> {
        let event = event.stamped();

        let matching: heapless::Vec<Arc<dyn EventHandler>, MAX_HANDLERS> =
            self.shared.handlers.lock(|table| {
                table
                    .borrow()
                    .iter()
                    .filter(|r| r.active && r.interest.contains(event.id))
                    .map(|r| r.handler.clone())
                    .collect()
            });

        let mut dropped = 0u32;
        for handler in matching {
            let Some(slot) = self.shared.slab.claim() else {
                warn!("Work slab exhausted; dropping {} for one handler", event.id);
                dropped += 1;
                continue;
            };
            let item = WorkItem {
                handler,
                event,
                _slot: slot,
            };
            if self.shared.work.try_send(item).is_err() {
                warn!("Work queue full; dropping {} for one handler", event.id);
                dropped += 1;
            }
        }

        if dropped > 0 {
            self.shared.dropped.fetch_add(dropped, Ordering::Relaxed);
            return Err(BusError::CapacityExceeded("work item slab"));
        }
        debug!("Published {}", event.id);
        Ok(())
    }

    pub fn handler_count(&self) -> usize {
        self.shared.handlers.lock(|t| t.borrow().len())
    }

    /// Work items claimed and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.shared.slab.in_use()
    }

    /// Deliveries lost to slab exhaustion since start.
    pub fn dropped_deliveries(&self) -> u32 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.stop.signal(());
        if task_pin::join_bounded(handle, millis(self.shared.config.shutdown_join_ms)) {
            info!("Event bus de-initialised");
        } else {
            warn!(
                "Bus worker did not stop within {} ms; detaching",
                self.shared.config.shutdown_join_ms
            );
        }
    }
}

impl Drop for CallbackBus {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl EventBus for CallbackBus {
    fn publish(&self, event: Event) -> Result<()> {
        CallbackBus::publish(self, event)
    }

    /// Mailboxes are fed by a forwarding handler that never blocks the
    /// worker: a full mailbox loses the event.
    fn attach(&self, target: Arc<dyn DeliveryTarget>, interests: &[EventId]) -> Result<Attachment> {
        if target.capacity() == 0 {
            return Err(BusError::InvalidArgument("empty delivery target"));
        }
        let index = self.register_handler(
            move |event: &Event| {
                if !target.offer(*event) {
                    warn!("Consumer mailbox full; dropped {}", event.id);
                }
            },
            interests,
        )?;
        Ok(Attachment::Handler(index))
    }

    fn detach(&self, attachment: Attachment) -> Result<()> {
        match attachment {
            Attachment::Handler(index) => self.deactivate(index),
            Attachment::Subscription(_) => {
                Err(BusError::InvalidArgument("not a callback-bus handler"))
            }
        }
    }
}
