//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing controller events to the logger
//! (UART on the device, stderr in the simulator).

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { system, wash } => {
                info!("START | system={} | wash={}", system, wash);
            }
            AppEvent::SystemStateChanged { from, to } => {
                info!("STATE | {} -> {}", from, to);
            }
            AppEvent::WashStateChanged { from, to } => {
                info!("WASH  | {} -> {}", from, to);
            }
            AppEvent::CycleFinished => {
                info!("WASH  | cycle finished");
            }
            AppEvent::ProgramSelected(program) => {
                let flags = program.program();
                info!(
                    "PROG  | {} (id={}) | prewash={} heating={} steam={}",
                    program,
                    program.id(),
                    flags.has_prewash,
                    flags.has_heating,
                    flags.has_steam
                );
            }
        }
    }
}
