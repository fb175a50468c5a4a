//! Circuit breaker for provider rate limiting and IP bans.
//!
//! A run issues three requests per symbol for hundreds of symbols. Once Yahoo
//! starts answering 403 (IP ban) or keeps answering 429/5xx, every further
//! request only extends the ban, so the breaker opens and refuses requests for
//! a cooldown period (default 30 minutes).

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// Requests are refused until the cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

/// Shared between all requests of one provider.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    /// Breaker that opens after `failure_threshold` consecutive failures.
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 30-minute cooldown, opens after 3 consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    // A panic while holding the lock cannot leave Inner half-updated.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if requests are currently allowed. Closes the breaker once the
    /// cooldown has expired.
    pub fn is_allowed(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                inner.state = BreakerState::Closed;
                inner.consecutive_failures = 0;
                tracing::info!("provider circuit breaker closed after cooldown");
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Record a failed request; opens the breaker at the threshold.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
            tracing::warn!(
                failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "provider circuit breaker opened"
            );
        }
    }

    /// Open immediately (HTTP 403).
    pub fn trip(&self) {
        let mut inner = self.lock();
        inner.state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
        tracing::warn!(
            cooldown_secs = self.cooldown.as_secs(),
            "provider circuit breaker tripped"
        );
    }
}
