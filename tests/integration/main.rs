//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one subsystem through the public API with
//! real bus threads and mock adapters.  Everything runs on the host.

#![cfg(not(target_os = "espidf"))]

mod callback_bus_tests;
mod controller_tests;
mod mock_sink;
mod queued_bus_tests;
