use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token bucket refilled at `rps` tokens per second, holding at most `rps`.
#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    bucket: Arc<Mutex<Bucket>>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    pub fn new(rps: u32) -> Self {
        let rps = rps.max(1);
        Self {
            rps,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: rps as f64,
                last: Instant::now(),
            })),
        }
    }

    /// Take one token, or report roughly how long until one is available.
    pub async fn check(&self) -> Result<(), String> {
        let mut bucket = self.bucket.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last);
        bucket.last = now;

        let capacity = self.rps as f64;
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * capacity).min(capacity);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        let wait = Duration::from_secs_f64((1.0 - bucket.tokens) / capacity);
        Err(format!(
            "rate limit exceeded (RATE_LIMIT_RPS={}): try again in ~{}ms",
            self.rps,
            wait.as_millis()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_burst_up_to_capacity_then_refuses() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.check().await.is_ok());
        assert!(limiter.check().await.is_ok());
        let err = limiter.check().await.unwrap_err();
        assert!(err.starts_with("rate limit exceeded (RATE_LIMIT_RPS=2)"));
    }

    #[tokio::test]
    async fn refills_over_time() {
        let limiter = RateLimiter::new(20);
        for _ in 0..20 {
            limiter.check().await.unwrap();
        }
        assert!(limiter.check().await.is_err());
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(limiter.check().await.is_ok());
    }
}
