//! Two-level hierarchical state machine.
//!
//! ```text
//! ┌───────────────────────── FsmHandle::process_event(ev) ─────────────────────────┐
//! │                                                                                │
//! │  1. RUNNING and ev ∈ {pause, power loss, fatal fault}?                         │
//! │        └─ yes ─▶ system::override_transition, L2 untouched, done with ev       │
//! │  2. RUNNING?  yes ─▶ wash_cycle::transition(L2, ev, program)                   │
//! │               no  ─▶ system::transition(L1, ev)  (+ start / reset L2)          │
//! │  3. L2 entered COMPLETE during this call?                                      │
//! │        └─ yes ─▶ system::transition(L1, CycleFinished)   ─▶ RUNNING → END      │
//! └────────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The transition functions in [`system`] and [`wash_cycle`] are pure;
//! this module only composes them.  The handle does no locking: exactly
//! one thread owns it (the controller), which `&mut self` enforces.

pub mod program;
pub mod system;
pub mod wash_cycle;

use core::fmt;

use log::{debug, info};

use crate::events::EventId;

pub use program::WashProgram;
pub use system::{SystemState, WashCommand};
pub use wash_cycle::WashCycleState;

// ---------------------------------------------------------------------------
// FSM vocabulary
// ---------------------------------------------------------------------------

/// Events the state machine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FsmEvent {
    PowerButtonPressed = 0,
    CycleSelected,
    StartButtonPressed,
    PauseButtonPressed,
    CancelButtonPressed,
    AnyKeyPressed,
    WeightCalculated,
    DosingComplete,
    TimerExpired,
    DrumEmpty,
    WaterLevelReached,
    TempReached,
    PowerLossDetected,
    PowerRestored,
    FatalFaultDetected,
    /// Normally synthesized when the wash cycle completes.
    CycleFinished,
}

impl FsmEvent {
    pub const ALL: [FsmEvent; 16] = [
        Self::PowerButtonPressed,
        Self::CycleSelected,
        Self::StartButtonPressed,
        Self::PauseButtonPressed,
        Self::CancelButtonPressed,
        Self::AnyKeyPressed,
        Self::WeightCalculated,
        Self::DosingComplete,
        Self::TimerExpired,
        Self::DrumEmpty,
        Self::WaterLevelReached,
        Self::TempReached,
        Self::PowerLossDetected,
        Self::PowerRestored,
        Self::FatalFaultDetected,
        Self::CycleFinished,
    ];

    /// Map a bus id onto the FSM vocabulary.  Ids the machine has no
    /// transition for (door, motor, heater telemetry...) map to `None`.
    pub const fn from_bus(id: EventId) -> Option<Self> {
        let ev = match id {
            EventId::PowerButtonPressed => Self::PowerButtonPressed,
            EventId::CycleSelected => Self::CycleSelected,
            EventId::StartButtonPressed => Self::StartButtonPressed,
            EventId::PauseButtonPressed => Self::PauseButtonPressed,
            EventId::CancelButtonPressed => Self::CancelButtonPressed,
            EventId::AnyKeyPressed => Self::AnyKeyPressed,
            EventId::WeightCalculated => Self::WeightCalculated,
            EventId::DosingComplete => Self::DosingComplete,
            EventId::TimerExpired => Self::TimerExpired,
            EventId::DrumEmpty => Self::DrumEmpty,
            EventId::WaterLevelReached => Self::WaterLevelReached,
            EventId::TempReached => Self::TempReached,
            EventId::PowerLossDetected => Self::PowerLossDetected,
            EventId::PowerRestored => Self::PowerRestored,
            EventId::FatalFaultDetected => Self::FatalFaultDetected,
            EventId::CycleFinished => Self::CycleFinished,
            _ => return None,
        };
        Some(ev)
    }

    /// The bus id carrying this event.
    pub const fn bus_id(self) -> EventId {
        match self {
            Self::PowerButtonPressed => EventId::PowerButtonPressed,
            Self::CycleSelected => EventId::CycleSelected,
            Self::StartButtonPressed => EventId::StartButtonPressed,
            Self::PauseButtonPressed => EventId::PauseButtonPressed,
            Self::CancelButtonPressed => EventId::CancelButtonPressed,
            Self::AnyKeyPressed => EventId::AnyKeyPressed,
            Self::WeightCalculated => EventId::WeightCalculated,
            Self::DosingComplete => EventId::DosingComplete,
            Self::TimerExpired => EventId::TimerExpired,
            Self::DrumEmpty => EventId::DrumEmpty,
            Self::WaterLevelReached => EventId::WaterLevelReached,
            Self::TempReached => EventId::TempReached,
            Self::PowerLossDetected => EventId::PowerLossDetected,
            Self::PowerRestored => EventId::PowerRestored,
            Self::FatalFaultDetected => EventId::FatalFaultDetected,
            Self::CycleFinished => EventId::CycleFinished,
        }
    }
}

impl fmt::Display for FsmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bus_id().name())
    }
}

// ---------------------------------------------------------------------------
// Program flags
// ---------------------------------------------------------------------------

/// Optional phases of the selected program, read by the branch states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Program {
    pub has_prewash: bool,
    pub has_heating: bool,
    pub has_steam: bool,
}

// ---------------------------------------------------------------------------
// Dispatch report
// ---------------------------------------------------------------------------

/// What one `process_event` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// `(from, to)` if the system state changed.
    pub system: Option<(SystemState, SystemState)>,
    /// `(from, to)` if the wash-cycle state changed.
    pub wash: Option<(WashCycleState, WashCycleState)>,
    /// The event was consumed by a running-state override.
    pub overridden: bool,
    /// `CycleFinished` was synthesized because L2 reached `Complete`.
    pub cycle_finished: bool,
}

impl Dispatch {
    /// Nothing happened.
    pub fn is_noop(&self) -> bool {
        self.system.is_none() && self.wash.is_none()
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// The device's single authoritative state machine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsmHandle {
    pub system_state: SystemState,
    pub wash_cycle_state: WashCycleState,
    pub program: Program,
}

impl FsmHandle {
    /// Powered off, idle cycle, no optional phases.
    pub const fn new() -> Self {
        Self {
            system_state: SystemState::PowerOff,
            wash_cycle_state: WashCycleState::Idle,
            program: Program {
                has_prewash: false,
                has_heating: false,
                has_steam: false,
            },
        }
    }

    /// Replace the program flags.  Only honoured before a cycle is started
    /// (`Standby` or `Selection`); returns whether it was applied.
    pub fn select_program(&mut self, program: Program) -> bool {
        if matches!(self.system_state, SystemState::Standby | SystemState::Selection) {
            self.program = program;
            true
        } else {
            false
        }
    }

    /// Feed one event through both levels.  Never fails: an event with no
    /// matching transition changes nothing.
    pub fn process_event(&mut self, event: FsmEvent) -> Dispatch {
        let system_before = self.system_state;
        let wash_before = self.wash_cycle_state;
        let mut report = Dispatch::default();

        if let Some(next) = system::override_transition(self.system_state, event) {
            self.system_state = next;
            report.overridden = true;
        } else if self.system_state == SystemState::Running {
            if let Some(next) = wash_cycle::transition(self.wash_cycle_state, event, &self.program) {
                self.wash_cycle_state = next;
            }
        } else {
            self.apply_system(event);
        }

        if wash_before != WashCycleState::Complete
            && self.wash_cycle_state == WashCycleState::Complete
        {
            report.cycle_finished = true;
            self.apply_system(FsmEvent::CycleFinished);
        }

        if system_before != self.system_state {
            info!("L1 State Change: {} -> {}", system_before, self.system_state);
            report.system = Some((system_before, self.system_state));
        }
        if wash_before != self.wash_cycle_state {
            info!("L2 State Change: {} -> {}", wash_before, self.wash_cycle_state);
            report.wash = Some((wash_before, self.wash_cycle_state));
        }
        if report.is_noop() {
            debug!("{} ignored in {} / {}", event, self.system_state, self.wash_cycle_state);
        }
        report
    }

    fn apply_system(&mut self, event: FsmEvent) {
        let Some(step) = system::transition(self.system_state, event) else {
            return;
        };
        self.system_state = step.next;
        match step.wash {
            Some(WashCommand::Start) => self.wash_cycle_state = wash_cycle::start(),
            Some(WashCommand::Reset) => self.wash_cycle_state = wash_cycle::reset(),
            None => {}
        }
    }
}

impl Default for FsmHandle {
    fn default() -> Self {
        Self::new()
    }
}
