//! Monotonic time source for the keep-alive deadline

use std::time::{Duration, Instant};

pub trait Clock {
    /// Time since an arbitrary fixed origin, never goes backwards
    fn now(&self) -> Duration;
}

/// Wall-clock independent time since boot
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
