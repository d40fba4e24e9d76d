//! Token-bucket rate limiting for WS-originated mutations.
//!
//! Buckets are keyed by opaque strings (`typing:{user}:{channel}`,
//! `messages:{user}`, ...) rather than a structured key, since call sites
//! vary in what they want to scope a bucket to. Separate from the slowmode
//! check in `ecto-db` (a per-channel, per-author content rule derived from
//! message history) — this guards the gateway itself against a single
//! connection flooding it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ecto_domain::EctoError;
use parking_lot::Mutex;

#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after_ms: u64,
}

impl From<RateLimitError> for EctoError {
    fn from(e: RateLimitError) -> Self {
        EctoError::RateLimited { retry_after: e.retry_after_ms.div_ceil(1000) }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_touched: Instant,
}

/// One bucket config (`limit` tokens per `window`) shared by every key
/// checked against this limiter instance. Different call sites use
/// differently-configured `RateLimiter`s (typing vs. message send vs.
/// reaction add each have their own limit/window).
pub struct RateLimiter {
    limit: f64,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(limit: f64, window: Duration) -> Self {
        Self { limit, window, buckets: Mutex::new(HashMap::new()) }
    }

    /// Refills `floor(elapsed / window * limit)` tokens, then decrements by
    /// one if available.
    pub fn check(&self, key: &str) -> Result<(), RateLimitError> {
        let mut buckets = self.buckets.lock();
        let now = Instant::now();
        let bucket = buckets
            .entry(key.to_owned())
            .or_insert_with(|| Bucket { tokens: self.limit, last_refill: now, last_touched: now });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        let refilled = (elapsed / self.window.as_secs_f64() * self.limit).floor();
        if refilled >= 1.0 {
            bucket.tokens = (bucket.tokens + refilled).min(self.limit);
            bucket.last_refill = now;
        }
        bucket.last_touched = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let per_token = self.window.as_secs_f64() / self.limit;
            let retry_after_ms = (per_token * 1000.0).ceil() as u64;
            let (kind, actor) = key.split_once(':').unwrap_or((key, key));
            ecto_domain::trace::TraceEvent::RateLimitTripped {
                bucket: kind.to_string(),
                actor_id: actor.to_string(),
                retry_after_ms,
            }
            .emit();
            Err(RateLimitError { retry_after_ms })
        }
    }

    /// Evicts buckets untouched for `idle_secs`. Callers run this on a
    /// periodic sweep (every 60s per the gateway's background ticker).
    pub fn sweep(&self, idle_secs: u64) {
        let cutoff = Duration::from_secs(idle_secs);
        let now = Instant::now();
        self.buckets.lock().retain(|_, b| now.duration_since(b.last_touched) < cutoff);
    }

    pub fn tracked_count(&self) -> usize {
        self.buckets.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_up_to_limit() {
        let limiter = RateLimiter::new(3.0, Duration::from_secs(1));
        assert!(limiter.check("typing:u1:c1").is_ok());
        assert!(limiter.check("typing:u1:c1").is_ok());
        assert!(limiter.check("typing:u1:c1").is_ok());
        assert!(limiter.check("typing:u1:c1").is_err());
    }

    #[test]
    fn separate_buckets_per_key() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(1));
        assert!(limiter.check("typing:u1:c1").is_ok());
        assert!(limiter.check("typing:u2:c1").is_ok());
    }

    #[test]
    fn sweep_evicts_idle_buckets() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(1));
        limiter.check("typing:u1:c1").unwrap();
        assert_eq!(limiter.tracked_count(), 1);
        limiter.sweep(0);
        assert_eq!(limiter.tracked_count(), 0);
    }
}
