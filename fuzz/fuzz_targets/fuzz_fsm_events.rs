//! Fuzz target: two-level state machine
//!
//! Interprets each input byte as an event (first byte picks the program
//! flags) and checks after every dispatch:
//! - No panics
//! - `Complete` is reached only from `Running`, and lands in `End`
//! - Override events in `Running` leave the wash cycle untouched
//!
//! cargo fuzz run fuzz_fsm_events

#![no_main]

use libfuzzer_sys::fuzz_target;
use washer::fsm::{FsmEvent, FsmHandle, Program, SystemState, WashCycleState};

fuzz_target!(|data: &[u8]| {
    let Some((&flags, events)) = data.split_first() else {
        return;
    };

    let mut fsm = FsmHandle::new();
    fsm.select_program(Program {
        has_prewash: flags & 1 != 0,
        has_heating: flags & 2 != 0,
        has_steam: flags & 4 != 0,
    });

    for &b in events {
        let ev = FsmEvent::ALL[b as usize % FsmEvent::ALL.len()];
        let before = fsm.clone();
        let report = fsm.process_event(ev);

        if report.cycle_finished {
            assert_eq!(before.system_state, SystemState::Running);
            assert_eq!(fsm.wash_cycle_state, WashCycleState::Complete);
            assert_eq!(fsm.system_state, SystemState::End);
        }
        if report.overridden {
            assert_eq!(before.system_state, SystemState::Running);
            assert_eq!(fsm.wash_cycle_state, before.wash_cycle_state);
        }
    }
});
