//! Port traits: the boundary between the controller and the outside world.
//!
//! ```text
//!   Controller (domain) ──▶ EventSink ──▶ adapter (log, display, test recorder)
//! ```

use super::events::AppEvent;

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / display)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`AppEvent`]s through this port.
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, event: &AppEvent) {
        (**self).emit(event);
    }
}
