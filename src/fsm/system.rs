//! System (L1) machine: power, selection, run/pause and fault handling.
//!
//! ```text
//!  POWER_OFF ◀──power──▶ STANDBY ──cycle selected──▶ SELECTION ──start──▶ RUNNING
//!      ▲                    ▲                          │   ▲                │
//!      └───────power────────┼──────────────────────────┘   │                │ cycle finished
//!                           │                              ├──any key── END ◀┘
//!                 FAILURE ──┘ power                        │
//!                                                          └──cancel── PAUSED
//!
//!  RUNNING overrides:  pause ──▶ PAUSED       ──start──────────▶ RUNNING
//!                      power loss ──▶ BROWNOUT ──power restored──▶ RUNNING
//!                      fatal fault ──▶ FAILURE
//! ```
//!
//! Both functions here are pure: they map `(state, event)` to the next
//! state and never touch the wash cycle themselves.  Side effects on L2
//! are returned as a [`WashCommand`] for the caller to apply.

use core::fmt;

use super::FsmEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SystemState {
    PowerOff = 0,
    Standby,
    Selection,
    Running,
    Paused,
    End,
    Brownout,
    Failure,
}

impl SystemState {
    pub const ALL: [SystemState; 8] = [
        Self::PowerOff,
        Self::Standby,
        Self::Selection,
        Self::Running,
        Self::Paused,
        Self::End,
        Self::Brownout,
        Self::Failure,
    ];

    /// Human-readable name for logs and the console.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PowerOff => "Power Off",
            Self::Standby => "Standby",
            Self::Selection => "Selection",
            Self::Running => "Running",
            Self::Paused => "Paused",
            Self::End => "End",
            Self::Brownout => "Brownout",
            Self::Failure => "Failure",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an L1 transition asks of the wash cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WashCommand {
    /// Begin a new cycle at load sensing.
    Start,
    /// Abandon the cycle and return to idle.
    Reset,
}

/// Outcome of a regular L1 transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: SystemState,
    pub wash: Option<WashCommand>,
}

impl Step {
    const fn to(next: SystemState) -> Self {
        Self { next, wash: None }
    }

    const fn with(next: SystemState, wash: WashCommand) -> Self {
        Self {
            next,
            wash: Some(wash),
        }
    }
}

/// High-priority events that interrupt a running cycle.  Only consulted
/// while `Running`; the wash cycle is left where it was.
pub fn override_transition(state: SystemState, event: FsmEvent) -> Option<SystemState> {
    if state != SystemState::Running {
        return None;
    }
    match event {
        FsmEvent::PauseButtonPressed => Some(SystemState::Paused),
        FsmEvent::PowerLossDetected => Some(SystemState::Brownout),
        FsmEvent::FatalFaultDetected => Some(SystemState::Failure),
        _ => None,
    }
}

/// Regular L1 table.  `None` means the event has no effect in `state`.
pub fn transition(state: SystemState, event: FsmEvent) -> Option<Step> {
    use FsmEvent as E;
    use SystemState as S;

    let step = match (state, event) {
        (S::PowerOff, E::PowerButtonPressed) => Step::to(S::Standby),

        (S::Standby, E::CycleSelected) => Step::to(S::Selection),
        (S::Standby, E::PowerButtonPressed) => Step::to(S::PowerOff),

        (S::Selection, E::StartButtonPressed) => Step::with(S::Running, WashCommand::Start),
        (S::Selection, E::PowerButtonPressed) => Step::to(S::PowerOff),

        (S::Running, E::CycleFinished) => Step::to(S::End),

        // Resume keeps the wash cycle where it was paused.
        (S::Paused, E::StartButtonPressed) => Step::to(S::Running),
        (S::Paused, E::CancelButtonPressed) => Step::with(S::Selection, WashCommand::Reset),

        (S::End, E::AnyKeyPressed) => Step::to(S::Selection),
        (S::Brownout, E::PowerRestored) => Step::to(S::Running),
        (S::Failure, E::PowerButtonPressed) => Step::to(S::Standby),

        _ => return None,
    };
    Some(step)
}
