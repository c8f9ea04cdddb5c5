//! Washer control core.
//!
//! A process-wide publish/subscribe event bus (queued or callback
//! dispatch, chosen at build time) and the two-level wash-cycle state
//! machine that consumes it.  ESP-IDF specifics sit behind the `espidf`
//! feature; everything else runs and is tested on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod bus;
pub mod config;
pub mod console;
pub mod drivers;
pub mod error;
pub mod events;
pub mod fsm;
pub mod sensors;
pub mod wait;

#[cfg(all(target_os = "espidf", feature = "espidf"))]
mod esp_link_shims;
