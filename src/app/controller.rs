//! FSM controller: the bus consumer that owns the state machine.
//!
//! ```text
//!  EventBus ──attach──▶ Mailbox<16> ──▶ controller thread ──▶ Controller::handle_event
//!                                                              │  program selection
//!                                                              │  FsmHandle::process_event
//!                                                              ▼
//!                                              EventSink  +  published FsmSnapshot
//! ```
//!
//! [`Controller`] is plain synchronous logic and is tested directly.
//! [`spawn`] wraps it in a thread and hands back a [`ControllerHandle`]
//! through which other threads read the latest snapshot.  Shutting the
//! handle down detaches the mailbox from the bus before the thread stops
//! draining it.

use core::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::future;
use log::{debug, error, info, warn};

use super::events::AppEvent;
use super::ports::EventSink;
use crate::bus::{Attachment, EventBus, Mailbox};
use crate::config::{CONTROLLER_QUEUE_DEPTH, DeviceConfig};
use crate::drivers::task_pin::{self, Core, TaskHandle};
use crate::error::{BusError, Result};
use crate::events::{Event, EventId};
use crate::fsm::{Dispatch, FsmEvent, FsmHandle, Program, SystemState, WashCycleState, WashProgram};
use crate::wait::{self, millis};

/// Everything the state machine reacts to, plus the door events it
/// currently only traces.
pub const CONTROLLER_EVENTS: [EventId; 18] = [
    EventId::AnyKeyPressed,
    EventId::CancelButtonPressed,
    EventId::CycleFinished,
    EventId::CycleSelected,
    EventId::DoorClosed,
    EventId::DoorOpened,
    EventId::DosingComplete,
    EventId::DrumEmpty,
    EventId::FatalFaultDetected,
    EventId::PauseButtonPressed,
    EventId::PowerButtonPressed,
    EventId::PowerLossDetected,
    EventId::PowerRestored,
    EventId::StartButtonPressed,
    EventId::TempReached,
    EventId::TimerExpired,
    EventId::WaterLevelReached,
    EventId::WeightCalculated,
];

/// Point-in-time copy of the controller state, safe to read from any
/// thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsmSnapshot {
    pub system_state: SystemState,
    pub wash_cycle_state: WashCycleState,
    pub program: Program,
    pub selected: Option<WashProgram>,
    pub events_processed: u32,
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

pub struct Controller {
    fsm: FsmHandle,
    selected: Option<WashProgram>,
    processed: u32,
}

impl Controller {
    pub fn new() -> Self {
        Self {
            fsm: FsmHandle::new(),
            selected: None,
            processed: 0,
        }
    }

    pub fn start(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            system: self.fsm.system_state,
            wash: self.fsm.wash_cycle_state,
        });
        info!(
            "FSM controller started in {} / {}",
            self.fsm.system_state, self.fsm.wash_cycle_state
        );
    }

    /// Apply one delivered bus event.  Returns the FSM report, or `None`
    /// if the id means nothing to the state machine.
    pub fn handle_event(&mut self, event: &Event, sink: &mut impl EventSink) -> Option<Dispatch> {
        self.processed = self.processed.wrapping_add(1);
        debug!("Controller processing {} ({:?})", event.id, event.payload);

        if event.id == EventId::CycleSelected {
            self.select_program(event.payload.as_u32(), sink);
        }

        let Some(fsm_event) = FsmEvent::from_bus(event.id) else {
            debug!("Controller: {} has no FSM meaning", event.id);
            return None;
        };

        let report = self.fsm.process_event(fsm_event);
        if let Some((from, to)) = report.system {
            sink.emit(&AppEvent::SystemStateChanged { from, to });
        }
        if let Some((from, to)) = report.wash {
            sink.emit(&AppEvent::WashStateChanged { from, to });
        }
        if report.cycle_finished {
            sink.emit(&AppEvent::CycleFinished);
        }
        Some(report)
    }

    fn select_program(&mut self, id: u32, sink: &mut impl EventSink) {
        let Some(program) = WashProgram::from_id(id) else {
            warn!("Unknown cycle id {}; keeping current program", id);
            return;
        };
        if self.fsm.select_program(program.program()) {
            self.selected = Some(program);
            sink.emit(&AppEvent::ProgramSelected(program));
        } else {
            warn!(
                "Cycle {} selected while {}; ignored",
                program, self.fsm.system_state
            );
        }
    }

    pub fn fsm(&self) -> &FsmHandle {
        &self.fsm
    }

    pub fn snapshot(&self) -> FsmSnapshot {
        FsmSnapshot {
            system_state: self.fsm.system_state,
            wash_cycle_state: self.fsm.wash_cycle_state,
            program: self.fsm.program,
            selected: self.selected,
            events_processed: self.processed,
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Controller thread
// ───────────────────────────────────────────────────────────────

struct Shared {
    mailbox: Arc<Mailbox<CONTROLLER_QUEUE_DEPTH>>,
    snapshot: BlockingMutex<CriticalSectionRawMutex, Cell<FsmSnapshot>>,
    /// Raised after every snapshot update.
    updated: Signal<CriticalSectionRawMutex, ()>,
    stop: Signal<CriticalSectionRawMutex, ()>,
}

enum Wake {
    Event(Event),
    Stop,
}

fn run(shared: &Shared, mut sink: impl EventSink) {
    let mut controller = Controller::new();
    controller.start(&mut sink);

    loop {
        let wake = wait::block_on(future::or(
            async { Wake::Event(shared.mailbox.receive().await) },
            async {
                shared.stop.wait().await;
                Wake::Stop
            },
        ));
        let Wake::Event(event) = wake else {
            break;
        };
        controller.handle_event(&event, &mut sink);
        let snapshot = controller.snapshot();
        shared.snapshot.lock(|s| s.set(snapshot));
        shared.updated.signal(());
    }
    info!("FSM controller thread exiting");
}

/// Owner of the running controller thread.  Holds a reference to the
/// bus until shutdown so it can detach.
pub struct ControllerHandle {
    shared: Arc<Shared>,
    attachment: Attachment,
    bus: Option<Arc<dyn EventBus>>,
    thread: Option<TaskHandle>,
    join_timeout: Duration,
}

/// Attach the controller mailbox to `bus` and start the controller thread.
pub fn spawn<B, S>(bus: Arc<B>, sink: S, config: &DeviceConfig) -> Result<ControllerHandle>
where
    B: EventBus + 'static,
    S: EventSink + Send + 'static,
{
    let shared = Arc::new(Shared {
        mailbox: Arc::new(Mailbox::new()),
        snapshot: BlockingMutex::new(Cell::new(Controller::new().snapshot())),
        updated: Signal::new(),
        stop: Signal::new(),
    });

    let attachment = bus
        .attach(shared.mailbox.clone(), &CONTROLLER_EVENTS)
        .inspect_err(|e| error!("Failed to attach FSM controller to the bus: {}", e))?;
    info!("FSM event handler registered successfully");

    let worker = shared.clone();
    let thread = task_pin::spawn_on_core(
        Core::App,
        config.controller_priority,
        config.bus.dispatcher_stack_kb,
        "fsm_controller\0",
        move || run(&worker, sink),
    )
    .map_err(|e| {
        error!("Failed to create FSM controller thread: {}", e);
        if let Err(e) = bus.detach(attachment) {
            warn!("Failed to detach FSM controller mailbox: {}", e);
        }
        BusError::Spawn
    })?;

    Ok(ControllerHandle {
        shared,
        attachment,
        bus: Some(bus as Arc<dyn EventBus>),
        thread: Some(thread),
        join_timeout: millis(config.bus.shutdown_join_ms),
    })
}

impl ControllerHandle {
    /// Latest state published by the controller thread.
    pub fn snapshot(&self) -> FsmSnapshot {
        self.shared.snapshot.lock(|s| s.get())
    }

    /// Block until a snapshot satisfies `pred` or `timeout` elapses.
    ///
    /// Wakes on every controller update.  With several concurrent waiters
    /// one may take another's wake-up, so each wait is also capped at
    /// `RECHECK`.
    pub fn wait_for(
        &self,
        timeout: Duration,
        pred: impl Fn(&FsmSnapshot) -> bool,
    ) -> Option<FsmSnapshot> {
        const RECHECK: Duration = Duration::from_millis(20);

        let deadline = Instant::now() + timeout;
        loop {
            let snap = self.snapshot();
            if pred(&snap) {
                return Some(snap);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            wait::block_on_timeout(self.shared.updated.wait(), remaining.min(RECHECK));
        }
    }

    /// How the controller is attached to the bus.
    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    /// Events delivered but not yet processed.
    pub fn backlog(&self) -> usize {
        self.shared.mailbox.len()
    }

    /// Detach from the bus, then stop the thread.  The order matters: a
    /// mailbox still attached after its reader is gone would fill up and
    /// stall the queued dispatcher for every other consumer.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        if let Some(bus) = self.bus.take() {
            match bus.detach(self.attachment) {
                Ok(()) => info!("FSM controller detached from the bus"),
                Err(e) => error!("Failed to detach FSM controller: {}", e),
            }
        }
        self.shared.stop.signal(());
        if !task_pin::join_bounded(thread, self.join_timeout) {
            warn!("FSM controller did not stop in time; detaching");
        }
    }
}

impl Drop for ControllerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
