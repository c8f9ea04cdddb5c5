//! Simulated digital inputs for the host build.
//!
//! A [`SimInput`] is an `embedded-hal` input pin whose level lives in a
//! shared atomic.  Clones observe the same level, so the console can flip
//! the door or the water level while a poller reads the pin.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embedded_hal::digital::{ErrorType, InputPin};

#[derive(Debug, Clone)]
pub struct SimInput {
    level: Arc<AtomicBool>,
}

impl SimInput {
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
        }
    }

    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

impl ErrorType for SimInput {
    type Error = Infallible;
}

impl InputPin for SimInput {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.get())
    }
}
