//! Token bucket admission control for expensive validators

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Shortest sleep between re-checks in [`RateLimiter::acquire_blocking`]
pub const MIN_WAIT_QUANTUM: Duration = Duration::from_millis(10);

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let refill = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + refill).min(self.capacity);
        self.last_refill = now;
    }

    /// Time until `cost` tokens are available
    ///
    /// `None` when they never will be, or not within any representable wait.
    fn time_until(&self, cost: f64) -> Option<Duration> {
        if self.tokens >= cost {
            return Some(Duration::ZERO);
        }
        if self.refill_rate <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64((cost - self.tokens) / self.refill_rate).ok()
    }
}

/// Token bucket rate limiter
///
/// One bucket shared by every caller holding the limiter. Refill is computed
/// lazily on each acquire; refill and deduction happen under one lock so
/// concurrent callers cannot lose updates. A denial is backpressure, not an
/// error.
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Create a full bucket
    ///
    /// # Arguments
    /// * `capacity` - Maximum tokens the bucket holds
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        let capacity = sanitize(capacity);
        Self {
            bucket: Mutex::new(TokenBucket {
                capacity,
                tokens: capacity,
                refill_rate: sanitize(refill_rate),
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> f64 {
        self.lock().capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.lock().refill_rate
    }

    /// Tokens available right now
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        bucket.refill(Instant::now());
        bucket.tokens
    }

    /// Take `cost` tokens if they are available, without waiting
    pub fn try_acquire(&self, cost: f64) -> bool {
        let mut bucket = self.lock();
        if !admissible(cost, bucket.capacity) {
            return false;
        }

        bucket.refill(Instant::now());
        if bucket.tokens >= cost {
            bucket.tokens -= cost;
            true
        } else {
            false
        }
    }

    /// Take `cost` tokens, waiting at most `timeout` for them to refill
    ///
    /// Only the calling task sleeps. Costs that can never be satisfied are
    /// denied immediately.
    pub async fn acquire_blocking(&self, cost: f64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            let wait = {
                let mut bucket = self.lock();
                if !admissible(cost, bucket.capacity) {
                    return false;
                }

                bucket.refill(Instant::now());
                if bucket.tokens >= cost {
                    bucket.tokens -= cost;
                    return true;
                }

                match bucket.time_until(cost) {
                    Some(wait) => wait,
                    None => return false,
                }
            };

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("Rate limiter wait for {} token(s) timed out", cost);
                return false;
            }

            let remaining = deadline - now;
            tokio::time::sleep(wait.max(MIN_WAIT_QUANTUM).min(remaining)).await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, TokenBucket> {
        // The bucket is consistent after every statement, so a poisoned lock is still usable.
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bucket = self.lock();
        f.debug_struct("RateLimiter")
            .field("capacity", &bucket.capacity)
            .field("tokens", &bucket.tokens)
            .field("refill_rate", &bucket.refill_rate)
            .finish()
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn admissible(cost: f64, capacity: f64) -> bool {
    cost.is_finite() && cost >= 0.0 && cost <= capacity
}
