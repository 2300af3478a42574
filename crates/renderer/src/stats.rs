//! Frame-rate accounting.
//!
//! The accumulator lives on the frame orchestrator instead of in
//! process-wide statics, so multiple hosts (or tests) never share counters.

use std::time::Duration;

/// Elapsed-time accumulator and frame counter.
#[derive(Debug, Default)]
pub struct FrameStats {
    frames: u64,
    elapsed: Duration,
}

impl FrameStats {
    /// Creates empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts one frame and returns the FPS once per second of
    /// accumulated time, resetting the window.
    pub fn update(&mut self, delta: Duration) -> Option<f64> {
        self.frames += 1;
        self.elapsed += delta;

        if self.elapsed.as_secs_f64() > 1.0 {
            let fps = self.frames as f64 / self.elapsed.as_secs_f64();
            self.frames = 0;
            self.elapsed = Duration::ZERO;
            Some(fps)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_after_a_second() {
        let mut stats = FrameStats::new();

        assert!(stats.update(Duration::from_millis(500)).is_none());
        assert!(stats.update(Duration::from_millis(500)).is_none());

        let fps = stats.update(Duration::from_millis(500)).unwrap();
        // 3 frames over 1.5 seconds
        assert!((fps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn resets_after_reporting() {
        let mut stats = FrameStats::new();

        stats.update(Duration::from_secs(2)).unwrap();

        // The window restarted: another report needs a fresh second
        assert!(stats.update(Duration::from_millis(100)).is_none());
    }
}
