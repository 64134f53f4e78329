// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Platform layer: window/event plumbing is winit's, re-exported so the rest
//! of the workspace never names winit directly. Also owns the monotonic
//! engine clock.

pub use winit;

use std::time::Instant;

/// Monotonic tick source. Ticks are milliseconds since `Clock::start()`.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Milliseconds elapsed since `start()`. Never goes backwards.
    pub fn ticks_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_are_monotonic() {
        let clock = Clock::start();
        let a = clock.ticks_ms();
        let b = clock.ticks_ms();
        assert!(b >= a);
    }

    #[test]
    fn ticks_start_near_zero() {
        let clock = Clock::start();
        assert!(clock.ticks_ms() < 1_000);
    }
}
