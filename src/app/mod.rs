//! Application core.
//!
//! The controller owns the hierarchical state machine and turns bus
//! events into state changes.  Everything it reports leaves through the
//! [`ports::EventSink`] port, so the whole layer runs under test with a
//! recording sink instead of a logger.

pub mod controller;
pub mod events;
pub mod ports;
