//! Request throttling for the catalog site

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;
use tracing::trace;

/// Rate limiter shared by every request the page reader makes
pub struct GlobalRateLimiter {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl GlobalRateLimiter {
    /// Create a limiter allowing `requests_per_second` (at least 1)
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let limiter = RateLimiter::direct(Quota::per_second(rps));

        Self { limiter }
    }

    /// Wait until a request is allowed
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
        trace!("Rate limiter released request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_burst_within_quota_is_immediate() {
        let limiter = GlobalRateLimiter::new(100);

        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_throttles_beyond_quota() {
        let limiter = GlobalRateLimiter::new(5);

        let start = Instant::now();
        for _ in 0..7 {
            limiter.wait().await;
        }
        // 5 burst cells, the next two wait ~200ms each
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_zero_falls_back_to_one() {
        let limiter = GlobalRateLimiter::new(0);
        limiter.wait().await;
    }
}
