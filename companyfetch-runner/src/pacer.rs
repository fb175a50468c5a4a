//! Pacing between symbols.
//!
//! The driver calls [`RateLimiter::acquire`] before each fetched symbol's
//! batch of provider calls and [`RateLimiter::release`] once the batch is
//! finished. Skipped symbols do neither.

use std::time::{Duration, Instant};

pub trait RateLimiter {
    /// Block until the next request batch may start. Returns the grant time.
    fn acquire(&mut self) -> Instant;

    /// Mark the end of the batch started by the last `acquire`.
    fn release(&mut self) {}
}

/// A fixed pause after every batch. The next grant comes `delay` after the
/// previous batch finished, however long that batch took.
#[derive(Debug)]
pub struct FixedDelay {
    delay: Duration,
    released_at: Option<Instant>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            released_at: None,
        }
    }
}

impl RateLimiter for FixedDelay {
    fn acquire(&mut self) -> Instant {
        if let Some(released_at) = self.released_at.take() {
            let ready = released_at + self.delay;
            let now = Instant::now();
            if ready > now {
                std::thread::sleep(ready - now);
            }
        }
        Instant::now()
    }

    fn release(&mut self) {
        self.released_at = Some(Instant::now());
    }
}

/// Never waits.
#[derive(Debug, Default)]
pub struct Unlimited;

impl RateLimiter for Unlimited {
    fn acquire(&mut self) -> Instant {
        Instant::now()
    }
}

/// `FixedDelay` for a non-zero pacing, `Unlimited` otherwise.
pub fn limiter_for(pacing: Duration) -> Box<dyn RateLimiter> {
    if pacing.is_zero() {
        Box::new(Unlimited)
    } else {
        Box::new(FixedDelay::new(pacing))
    }
}
