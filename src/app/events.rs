//! Outbound application events.
//!
//! The [`Controller`](super::controller::Controller) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters decide what
//! to do with them: log to the console, mirror to a display, etc.

use crate::fsm::{SystemState, WashCycleState, WashProgram};

/// Structured events emitted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEvent {
    /// The controller thread is up (carries the initial states).
    Started {
        system: SystemState,
        wash: WashCycleState,
    },

    /// The system (L1) machine changed state.
    SystemStateChanged { from: SystemState, to: SystemState },

    /// The wash-cycle (L2) machine changed state.
    WashStateChanged {
        from: WashCycleState,
        to: WashCycleState,
    },

    /// The wash cycle reached `Complete` and the run ended.
    CycleFinished,

    /// A program preset was applied.
    ProgramSelected(WashProgram),
}
