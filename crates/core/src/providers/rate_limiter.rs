//! Token bucket rate limiter for upstream API calls.
//!
//! One bucket per upstream provider. Callers `acquire().await` before each
//! request; when the bucket is empty they sleep until a token refills.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Default bucket capacity (allows bursting).
const DEFAULT_BUCKET_CAPACITY: f64 = 10.0;

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
    /// Tokens per second.
    rate: f64,
    capacity: f64,
}

impl TokenBucket {
    fn new(requests_per_minute: u32, capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: f64::from(requests_per_minute.max(1)) / 60.0,
            capacity,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&mut self) -> Duration {
        self.refill();
        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Rate limiter configuration.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,
    pub burst_capacity: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst_capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}

/// Thread-safe token bucket in front of a single upstream provider.
#[derive(Debug)]
pub struct RateLimiter {
    name: String,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(name: impl Into<String>, config: RateLimitConfig) -> Self {
        Self {
            name: name.into(),
            bucket: Mutex::new(TokenBucket::new(
                config.requests_per_minute,
                config.burst_capacity.max(1.0),
            )),
        }
    }

    /// Recovering from poison only risks slightly wrong pacing.
    fn lock_bucket(&self) -> MutexGuard<'_, TokenBucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter '{}' mutex was poisoned, recovering", self.name);
            poisoned.into_inner()
        })
    }

    /// Wait until a token is available, then take it.
    pub async fn acquire(&self) {
        loop {
            let wait_time = {
                let mut bucket = self.lock_bucket();
                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };

            if wait_time > Duration::ZERO {
                debug!("Rate limiter: waiting {:?} for '{}'", wait_time, self.name);
                tokio::time::sleep(wait_time).await;
            }
        }
    }

    /// Take a token without waiting. Returns false when rate limited.
    pub fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }

    pub fn remaining_tokens(&self) -> f64 {
        let mut bucket = self.lock_bucket();
        bucket.refill();
        bucket.tokens
    }
}
