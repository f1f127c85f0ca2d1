//! Rate limiting for operation execution

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Rate limiter using token bucket algorithm via governor crate
///
/// One instance is shared by every worker through `Arc`, so the configured
/// rate bounds the aggregate across all threads. Tokens refill one every
/// `1 / rate` seconds; the bucket holds one second worth of tokens (at least
/// one), which is also the largest burst it grants.
pub struct RequestRateLimiter {
    limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    rate_limit: Option<f64>,
    burst: u32,
}

impl RequestRateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `rate_limit` - Optional operations per second limit. None or a
    ///   non-positive value disables rate limiting.
    ///
    /// # Examples
    /// ```
    /// use cachebench_core::worker::RequestRateLimiter;
    ///
    /// // Create rate limiter for 100 operations per second
    /// let limiter = RequestRateLimiter::new(Some(100.0));
    ///
    /// // Create unlimited rate limiter
    /// let unlimited = RequestRateLimiter::new(None);
    /// ```
    pub fn new(rate_limit: Option<f64>) -> Self {
        let rps = rate_limit.filter(|rps| *rps > 0.0);
        let burst = rps
            .map(|rps| (rps.ceil().min(u32::MAX as f64) as u32).max(1))
            .unwrap_or(0);

        let limiter = rps.zip(NonZeroU32::new(burst)).map(|(rps, burst)| {
            // Governor keeps periods as u64 nanoseconds. A zero period (rates
            // above 1e9/s) falls back to a plain per-second quota.
            let max_period = Duration::from_nanos(u64::MAX);
            let period = Duration::try_from_secs_f64(1.0 / rps)
                .map_or(max_period, |period| period.min(max_period));
            let quota = Quota::with_period(period)
                .map_or_else(|| Quota::per_second(burst), |quota| quota.allow_burst(burst));
            RateLimiter::direct(quota)
        });

        Self {
            limiter,
            rate_limit,
            burst,
        }
    }

    /// Create an unlimited rate limiter (no rate limiting)
    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Block the calling thread until one operation is allowed
    pub fn wait(&self) {
        self.acquire(1);
    }

    /// Block the calling thread until `n` operations are allowed
    ///
    /// Returns immediately if no rate limit is configured. Requests larger
    /// than the bucket are served in bucket-sized chunks.
    pub fn acquire(&self, n: u32) {
        let Some(limiter) = &self.limiter else {
            return;
        };

        let mut remaining = n;
        while let Some(chunk) = NonZeroU32::new(remaining.min(self.burst)) {
            if let Err(e) = futures::executor::block_on(limiter.until_n_ready(chunk)) {
                // Chunks never exceed the burst size.
                tracing::warn!(error = %e, tokens = chunk.get(), "Rate limiter rejected request");
                return;
            }
            remaining -= chunk.get();
        }
    }

    /// Try to acquire a permit without waiting
    ///
    /// Returns `true` if an operation is allowed immediately, `false` otherwise.
    /// Always returns `true` if no rate limit is configured.
    pub fn try_acquire(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }

    /// Check if rate limiting is enabled
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Get the configured rate limit (operations per second)
    pub fn rate_limit(&self) -> Option<f64> {
        self.rate_limit
    }

    /// Largest number of operations granted without waiting
    pub fn burst_capacity(&self) -> u32 {
        self.burst
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("rate_limit", &self.rate_limit)
            .field("burst", &self.burst)
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_rate_limiter_disabled() {
        let limiter = RequestRateLimiter::new(None);
        assert!(!limiter.is_enabled());
        assert!(limiter.rate_limit().is_none());
        assert_eq!(limiter.burst_capacity(), 0);
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_rate_limiter_zero_rps() {
        let limiter = RequestRateLimiter::new(Some(0.0));
        assert!(!limiter.is_enabled());
    }

    #[test]
    fn test_rate_limiter_negative_rps() {
        let limiter = RequestRateLimiter::new(Some(-10.0));
        assert!(!limiter.is_enabled());
    }

    #[test]
    fn test_rate_limiter_enabled() {
        let limiter = RequestRateLimiter::new(Some(100.0));
        assert!(limiter.is_enabled());
        assert_eq!(limiter.rate_limit(), Some(100.0));
        assert_eq!(limiter.burst_capacity(), 100);
    }

    #[test]
    fn test_rate_limiter_sub_one_rps_keeps_single_token_burst() {
        let limiter = RequestRateLimiter::new(Some(0.5));
        assert!(limiter.is_enabled());
        assert_eq!(limiter.burst_capacity(), 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_rate_limiter_fractional_rps_holds_bound() {
        // 2.5 ops/sec with a 3-token burst: 5 ops need (5 - 3) / 2.5 = 0.8s.
        let limiter = RequestRateLimiter::new(Some(2.5));
        assert_eq!(limiter.burst_capacity(), 3);

        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait();
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(780),
            "5 ops at 2.5/s finished in {elapsed:?}"
        );
    }

    #[test]
    fn test_rate_limiter_default() {
        let limiter = RequestRateLimiter::default();
        assert!(!limiter.is_enabled());
        assert!(!RequestRateLimiter::unlimited().is_enabled());
    }

    #[test]
    fn test_rate_limiter_wait_disabled() {
        let limiter = RequestRateLimiter::new(None);
        let start = Instant::now();
        limiter.acquire(1_000_000);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_rate_limiter_burst_is_immediate() {
        let limiter = RequestRateLimiter::new(Some(1000.0));
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn test_rate_limiter_try_acquire_exhausts_burst() {
        let limiter = RequestRateLimiter::new(Some(5.0));
        for _ in 0..5 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_rate_limiter_bounds_shared_rate() {
        // 100 ops/sec with a 100-token burst: 150 ops need at least ~0.5s.
        let limiter = Arc::new(RequestRateLimiter::new(Some(100.0)));
        let start = Instant::now();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    for _ in 0..75 {
                        limiter.wait();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(400),
            "150 ops at 100/s finished in {elapsed:?}"
        );
    }

    #[test]
    fn test_rate_limiter_acquire_larger_than_burst() {
        let limiter = RequestRateLimiter::new(Some(10.0));
        let start = Instant::now();
        limiter.acquire(15);
        assert!(start.elapsed() >= Duration::from_millis(400));
    }

    #[test]
    fn test_rate_limiter_debug() {
        let limiter = RequestRateLimiter::new(Some(100.0));
        let debug = format!("{:?}", limiter);
        assert!(debug.contains("RequestRateLimiter"));
        assert!(debug.contains("100.0"));
        assert!(debug.contains("true"));
    }
}
