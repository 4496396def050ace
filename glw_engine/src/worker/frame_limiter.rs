/// Frame-rate cap for the end of a render cycle

use std::thread;
use std::time::{Duration, Instant};

/// Sleeps the part of the frame budget not spent rendering
///
/// The budget is `1000 / fps` milliseconds measured from the end of the
/// previous wait. The first wait sleeps the whole budget; a cycle that ran
/// over budget does not sleep at all.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    budget: Duration,
    last: Option<Instant>,
}

impl FrameLimiter {
    /// Limiter for `fps` frames per second; 0 disables the cap
    pub fn new(fps: u32) -> Self {
        let budget = if fps == 0 { Duration::ZERO } else { Duration::from_millis(1000 / fps as u64) };
        Self { budget, last: None }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Sleep still owed at `now`
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => self.budget.saturating_sub(now.saturating_duration_since(last)),
            None => self.budget,
        }
    }

    /// Sleep the remainder of the budget and start the next frame; returns the time slept
    pub fn wait(&mut self) -> Duration {
        let remaining = self.remaining(Instant::now());
        if !remaining.is_zero() {
            thread::sleep(remaining);
        }
        self.last = Some(Instant::now());
        remaining
    }

    /// Forget the previous frame (the next wait sleeps the whole budget)
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
#[path = "frame_limiter_tests.rs"]
mod tests;
