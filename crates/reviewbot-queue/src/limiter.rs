use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use reviewbot_core::ConfigError;

/// Fixed-interval limiter shared by every worker of one queue.
///
/// Grants are spaced at least `60s / max_per_minute` apart. Waiters are not
/// served in FIFO order: a sleeper can lose the slot to a newer caller.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    // None until the first grant; afterwards only ever moves forward.
    next_available: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Result<Self, ConfigError> {
        if max_per_minute == 0 {
            return Err(ConfigError::NonPositiveRate(0));
        }
        Ok(Self {
            interval: Duration::from_secs(60) / max_per_minute,
            next_available: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Block until a slot is free, then reserve it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut next = self.next_available.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                match *next {
                    Some(at) if at > now => at - now,
                    previous => {
                        let start = previous.map_or(now, |at| at.max(now));
                        *next = Some(start + self.interval);
                        return;
                    }
                }
            };
            // Re-check after sleeping; another caller may have taken the slot.
            thread::sleep(wait);
        }
    }
}
