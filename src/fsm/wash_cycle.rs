//! Wash-cycle (L2) machine, nested inside `SystemState::Running`.
//!
//! ```text
//!  IDLE ─(start)─▶ LOAD_SENSING ─weight─▶ DOSING ─dosed─▶ PREWASH_CHECK ─┬─▶ PREWASH ─timer─▶ DRAINING_PRE ─empty─┐
//!                                                                       └───────────── (no prewash) ────────────┤
//!                                                                                                               ▼
//!  ┌─────────────────────────────────────────────── HEATING_CHECK ◀──water level── FILLING ◀────────────────────┘
//!  ├─▶ HEATING ─temp─┐
//!  └─(no heating)────┴▶ WASHING ─timer─▶ DRAINING_WASH ─empty─▶ RINSING ─timer─▶ DRAINING_RINSE ─empty─▶ SPINNING
//!                                                                                                        │ timer
//!                                     COMPLETE ◀──timer── STEAMING ◀─┬── STEAM_CHECK ◀───────────────────┘
//!                                        ▲                           │
//!                                        └──────── (no steam) ───────┘
//! ```
//!
//! The three `*_CHECK` states are branch states: they resolve on the very
//! next dispatch from the program flags alone, whatever the event.
//! `IDLE` and `COMPLETE` accept nothing.

use core::fmt;

use super::{FsmEvent, Program};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WashCycleState {
    Idle = 0,
    LoadSensing,
    Dosing,
    PrewashCheck,
    Prewash,
    DrainingPre,
    Filling,
    HeatingCheck,
    Heating,
    Washing,
    DrainingWash,
    Rinsing,
    DrainingRinse,
    Spinning,
    SteamCheck,
    Steaming,
    Complete,
}

impl WashCycleState {
    pub const ALL: [WashCycleState; 17] = [
        Self::Idle,
        Self::LoadSensing,
        Self::Dosing,
        Self::PrewashCheck,
        Self::Prewash,
        Self::DrainingPre,
        Self::Filling,
        Self::HeatingCheck,
        Self::Heating,
        Self::Washing,
        Self::DrainingWash,
        Self::Rinsing,
        Self::DrainingRinse,
        Self::Spinning,
        Self::SteamCheck,
        Self::Steaming,
        Self::Complete,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::LoadSensing => "Load Sensing",
            Self::Dosing => "Dosing",
            Self::PrewashCheck => "Pre-Wash Check",
            Self::Prewash => "Pre-Wash",
            Self::DrainingPre => "Draining (Pre)",
            Self::Filling => "Filling",
            Self::HeatingCheck => "Heating Check",
            Self::Heating => "Heating",
            Self::Washing => "Washing",
            Self::DrainingWash => "Draining (Wash)",
            Self::Rinsing => "Rinsing",
            Self::DrainingRinse => "Draining (Rinse)",
            Self::Spinning => "Spinning",
            Self::SteamCheck => "Steam Check",
            Self::Steaming => "Steaming",
            Self::Complete => "Complete",
        }
    }

    /// Branch states resolve without looking at the event.
    pub const fn is_branch(self) -> bool {
        matches!(self, Self::PrewashCheck | Self::HeatingCheck | Self::SteamCheck)
    }
}

impl fmt::Display for WashCycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Entry point of a new cycle, whatever state L2 was left in.
pub const fn start() -> WashCycleState {
    WashCycleState::LoadSensing
}

/// Abandon the cycle.
pub const fn reset() -> WashCycleState {
    WashCycleState::Idle
}

/// L2 table.  `None` means `event` does not advance `state`.
pub fn transition(state: WashCycleState, event: FsmEvent, program: &Program) -> Option<WashCycleState> {
    use FsmEvent as E;
    use WashCycleState as W;

    let next = match state {
        W::PrewashCheck if program.has_prewash => W::Prewash,
        W::PrewashCheck => W::Filling,
        W::HeatingCheck if program.has_heating => W::Heating,
        W::HeatingCheck => W::Washing,
        W::SteamCheck if program.has_steam => W::Steaming,
        W::SteamCheck => W::Complete,

        W::LoadSensing if event == E::WeightCalculated => W::Dosing,
        W::Dosing if event == E::DosingComplete => W::PrewashCheck,
        W::Prewash if event == E::TimerExpired => W::DrainingPre,
        W::DrainingPre if event == E::DrumEmpty => W::Filling,
        W::Filling if event == E::WaterLevelReached => W::HeatingCheck,
        W::Heating if event == E::TempReached => W::Washing,
        W::Washing if event == E::TimerExpired => W::DrainingWash,
        W::DrainingWash if event == E::DrumEmpty => W::Rinsing,
        W::Rinsing if event == E::TimerExpired => W::DrainingRinse,
        W::DrainingRinse if event == E::DrumEmpty => W::Spinning,
        W::Spinning if event == E::TimerExpired => W::SteamCheck,
        W::Steaming if event == E::TimerExpired => W::Complete,

        _ => return None,
    };
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_OFF: Program = Program {
        has_prewash: false,
        has_heating: false,
        has_steam: false,
    };
    const ALL_ON: Program = Program {
        has_prewash: true,
        has_heating: true,
        has_steam: true,
    };

    #[test]
    fn branch_states_ignore_the_event() {
        for event in FsmEvent::ALL {
            assert_eq!(
                transition(WashCycleState::PrewashCheck, event, &ALL_ON),
                Some(WashCycleState::Prewash)
            );
            assert_eq!(
                transition(WashCycleState::HeatingCheck, event, &ALL_OFF),
                Some(WashCycleState::Washing)
            );
            assert_eq!(
                transition(WashCycleState::SteamCheck, event, &ALL_OFF),
                Some(WashCycleState::Complete)
            );
        }
    }

    #[test]
    fn linear_states_need_their_trigger() {
        assert_eq!(
            transition(WashCycleState::Filling, FsmEvent::TimerExpired, &ALL_ON),
            None
        );
        assert_eq!(
            transition(WashCycleState::Filling, FsmEvent::WaterLevelReached, &ALL_ON),
            Some(WashCycleState::HeatingCheck)
        );
        assert_eq!(
            transition(WashCycleState::Heating, FsmEvent::TempReached, &ALL_ON),
            Some(WashCycleState::Washing)
        );
    }

    #[test]
    fn idle_and_complete_are_quiescent() {
        for event in FsmEvent::ALL {
            assert_eq!(transition(WashCycleState::Idle, event, &ALL_ON), None);
            assert_eq!(transition(WashCycleState::Complete, event, &ALL_ON), None);
        }
    }

    #[test]
    fn full_cycle_with_every_option() {
        use FsmEvent as E;
        let script = [
            E::WeightCalculated,
            E::DosingComplete,
            E::AnyKeyPressed, // prewash check
            E::TimerExpired,
            E::DrumEmpty,
            E::WaterLevelReached,
            E::AnyKeyPressed, // heating check
            E::TempReached,
            E::TimerExpired,
            E::DrumEmpty,
            E::TimerExpired,
            E::DrumEmpty,
            E::TimerExpired,
            E::AnyKeyPressed, // steam check
            E::TimerExpired,
        ];
        let mut state = start();
        let mut visited = vec![state];
        for event in script {
            state = transition(state, event, &ALL_ON).unwrap();
            visited.push(state);
        }
        assert_eq!(&visited[..], &WashCycleState::ALL[1..]);
    }

    #[test]
    fn start_and_reset() {
        assert_eq!(start(), WashCycleState::LoadSensing);
        assert_eq!(reset(), WashCycleState::Idle);
    }

    #[test]
    fn names_match_display() {
        for state in WashCycleState::ALL {
            assert_eq!(state.to_string(), state.name());
        }
        assert_eq!(WashCycleState::DrainingRinse.name(), "Draining (Rinse)");
    }
}
