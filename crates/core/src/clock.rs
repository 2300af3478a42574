//! Frame pacing clock.

use std::time::{Duration, Instant};

/// Measures the wall-clock time between consecutive frames.
///
/// One `tick` per render step is the only surface the host needs: the delta
/// feeds the FPS accumulator. The first tick reports the time since
/// construction.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    /// Starts the clock.
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Returns the time since the previous tick and restarts the interval.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last;
        self.last = now;
        delta
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_cover_the_elapsed_interval() {
        let reference = Instant::now();
        let mut clock = FrameClock::new();

        let first = clock.tick();
        let second = clock.tick();

        // Consecutive intervals never overlap, so their sum is bounded by
        // the total time since the clock existed.
        assert!(first + second <= reference.elapsed());
    }
}
