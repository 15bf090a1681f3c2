//! Fixed-rate loop pacing

use std::time::{Duration, Instant};

/// Sleeps so that successive calls to [`Rate::sleep`] are one period apart.
///
/// A cycle that overran its period is not made up for: the next period
/// starts when the late call returns.
#[derive(Debug)]
pub struct Rate {
    period: Duration,
    deadline: Instant,
}

impl Rate {
    /// Pace at `hz` cycles per second. `None` unless `hz` is positive and finite.
    pub fn new(hz: f64) -> Option<Self> {
        if !(hz > 0.0 && hz.is_finite()) {
            return None;
        }
        let period = Duration::from_secs_f64(1.0 / hz);
        Some(Self {
            period,
            deadline: Instant::now() + period,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Block until the end of the current period
    pub fn sleep(&mut self) {
        let now = Instant::now();
        if now < self.deadline {
            std::thread::sleep(self.deadline - now);
            self.deadline += self.period;
        } else {
            self.deadline = now + self.period;
        }
    }
}
