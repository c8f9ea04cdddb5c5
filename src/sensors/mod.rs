//! Input producers: door switch and drum water level.
//!
//! Each sensor wraps an `embedded-hal` [`InputPin`](embedded_hal::digital::InputPin),
//! polls it and publishes bus events on level changes.  On the host the
//! pins are [`sim::SimInput`]s driven from the console.

pub mod door;
pub mod sim;
pub mod water_level;

use std::time::Instant;

/// Milliseconds since `boot`, wrapping like a 32-bit uptime counter.
pub fn uptime_ms(boot: Instant) -> u32 {
    boot.elapsed().as_millis() as u32
}
