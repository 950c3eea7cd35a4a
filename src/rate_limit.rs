use std::net::IpAddr;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

/// Per-IP fixed-window limiter for public subscribe requests.
pub struct SubscribeRateLimiter {
    /// ip -> (count, window_start)
    entries: DashMap<IpAddr, (u32, Instant)>,
    limit: u32,
    window: Duration,
}

impl SubscribeRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            limit,
            window,
        }
    }

    /// Count one request. Returns Err with retry-after seconds when over the limit.
    pub fn check(&self, ip: IpAddr) -> Result<(), u64> {
        let now = Instant::now();

        let mut entry = self.entries.entry(ip).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
            return Ok(());
        }

        if *count >= self.limit {
            let elapsed = now.duration_since(*start).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed));
        }

        *count += 1;
        Ok(())
    }

    /// Drop entries whose window has passed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) <= self.window);
    }
}

impl Default for SubscribeRateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60 * 60))
    }
}

/// Outbound mail throughput shared by every dispatch.
pub struct DispatchLimiter {
    inner: DefaultDirectRateLimiter,
}

impl DispatchLimiter {
    pub fn per_second(rate: u32) -> Self {
        let rate = NonZeroU32::new(rate).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: RateLimiter::direct(Quota::per_second(rate)),
        }
    }

    /// Wait until one more send fits the provider budget.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_limit_is_per_ip() {
        let limiter = SubscribeRateLimiter::new(2, Duration::from_secs(60));
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(a).is_ok());
        let retry_after = limiter.check(a).unwrap_err();
        assert!(retry_after <= 60);
        assert!(limiter.check(b).is_ok());
    }

    #[test]
    fn cleanup_keeps_live_windows() {
        let limiter = SubscribeRateLimiter::new(1, Duration::from_secs(60));
        let ip: IpAddr = "10.0.0.3".parse().unwrap();
        assert!(limiter.check(ip).is_ok());
        limiter.cleanup();
        assert!(limiter.check(ip).is_err());
    }

    #[tokio::test]
    async fn dispatch_limiter_admits_burst_up_to_rate() {
        let limiter = DispatchLimiter::per_second(50);
        let started = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
