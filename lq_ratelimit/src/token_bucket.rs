use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::AcquireFuture;
use crate::limiter::RateLimiter;
use crate::time::TimeSource;

/// Lock-free weighted token bucket
///
/// Tokens refill continuously at a constant rate up to `capacity`, and each
/// request removes its endpoint cost. A full bucket admits a burst of
/// `capacity` weight; after that requests are paced by the refill rate.
pub struct TokenBucket {
    /// Available tokens, scaled by TOKEN_SCALE
    tokens: AtomicU32,

    /// Last refill timestamp in nanoseconds
    last_refill: AtomicU64,

    capacity: u32,

    /// Scaled tokens added per RATE_SCALE nanoseconds
    rate_per_nano: u64,

    time_source: TimeSource,
}

// Fixed-point scaling so fractional refills are not lost
const TOKEN_SCALE: u32 = 1000;
const RATE_SCALE: u64 = 1_000_000_000;

/// Longest single sleep while waiting in `acquire`
const MAX_WAIT: Duration = Duration::from_millis(250);

impl TokenBucket {
    /// Create a full bucket holding `capacity` tokens, refilled at `rate` tokens per second
    pub fn new(capacity: u32, rate: f64) -> Result<Self> {
        if capacity == 0 {
            return Err(RateLimitError::InvalidConfig("capacity must be greater than 0"));
        }
        if capacity > u32::MAX / TOKEN_SCALE {
            return Err(RateLimitError::InvalidConfig("capacity too large"));
        }
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateLimitError::InvalidConfig("refill rate must be a positive number"));
        }

        // (rate * RATE_SCALE * TOKEN_SCALE) / 1e9 with RATE_SCALE == 1e9
        let rate_per_nano = (rate * TOKEN_SCALE as f64) as u64;
        if rate_per_nano == 0 {
            return Err(RateLimitError::InvalidConfig("refill rate too small"));
        }

        let time_source = TimeSource::new();
        let now = time_source.now_nanos();

        Ok(Self { tokens: AtomicU32::new(capacity * TOKEN_SCALE), last_refill: AtomicU64::new(now), capacity, rate_per_nano, time_source })
    }

    pub fn builder() -> TokenBucketBuilder {
        TokenBucketBuilder::new()
    }

    /// Refill rate in tokens per second
    pub fn rate(&self) -> f64 {
        self.rate_per_nano as f64 / TOKEN_SCALE as f64
    }

    #[inline(always)]
    fn refill(&self) {
        let now = self.time_source.now_nanos();
        let last = self.last_refill.load(Ordering::Relaxed);

        let elapsed = now.saturating_sub(last);
        if elapsed == 0 {
            return;
        }

        let (earned, consumed) = refill_step(elapsed, self.rate_per_nano, self.capacity * TOKEN_SCALE);
        if earned == 0 {
            return;
        }

        // Whoever moves the timestamp owns this refill; the unearned remainder stays pending
        if self.last_refill.compare_exchange(last, last + consumed, Ordering::Release, Ordering::Relaxed).is_ok() {
            self.add_scaled(earned);
        }
    }

    fn add_scaled(&self, amount: u32) {
        let capacity_scaled = self.capacity * TOKEN_SCALE;
        loop {
            let current = self.tokens.load(Ordering::Acquire);
            let new_tokens = current.saturating_add(amount).min(capacity_scaled);

            if current == new_tokens {
                break;
            }

            match self.tokens.compare_exchange_weak(current, new_tokens, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => break,
                Err(_) => continue,
            }
        }
    }

    /// Time until `weight` tokens should be available
    fn wait_hint(&self, weight: u32) -> Duration {
        let required = weight * TOKEN_SCALE;
        let current = self.tokens.load(Ordering::Relaxed);
        let deficit = required.saturating_sub(current) as u64;

        let nanos = (deficit * RATE_SCALE).div_ceil(self.rate_per_nano);
        Duration::from_nanos(nanos).clamp(Duration::from_micros(1), MAX_WAIT)
    }

    fn check_weight(&self, weight: u32) -> Result<()> {
        if weight > self.capacity {
            return Err(RateLimitError::WeightExceedsCapacity { weight, capacity: self.capacity });
        }
        Ok(())
    }
}

/// Scaled tokens earned over `elapsed` nanoseconds and the nanoseconds they used up
///
/// A full-capacity refill consumes the whole interval.
#[inline(always)]
fn refill_step(elapsed: u64, rate_per_nano: u64, capacity_scaled: u32) -> (u32, u64) {
    let earned = elapsed.saturating_mul(rate_per_nano) / RATE_SCALE;
    if earned >= capacity_scaled as u64 {
        return (capacity_scaled, elapsed);
    }
    (earned as u32, earned * RATE_SCALE / rate_per_nano)
}

impl RateLimiter for TokenBucket {
    #[inline]
    fn try_acquire(&self, weight: u32) -> Result<()> {
        if weight == 0 {
            return Ok(());
        }
        self.check_weight(weight)?;

        self.refill();

        let required_tokens = weight * TOKEN_SCALE;
        loop {
            let current = self.tokens.load(Ordering::Acquire);

            if current < required_tokens {
                return Err(RateLimitError::Exceeded);
            }

            match self.tokens.compare_exchange_weak(current, current - required_tokens, Ordering::Release, Ordering::Relaxed) {
                Ok(_) => return Ok(()),
                Err(_) => continue,
            }
        }
    }

    fn acquire(&self, weight: u32) -> AcquireFuture<'_> {
        Box::pin(async move {
            self.check_weight(weight)?;

            loop {
                match self.try_acquire(weight) {
                    Ok(()) => return Ok(()),
                    Err(RateLimitError::Exceeded) => {
                        let delay = self.wait_hint(weight);
                        tracing::trace!(weight, ?delay, "token bucket empty, waiting");
                        tokio::time::sleep(delay).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        })
    }

    fn refund(&self, weight: u32) {
        if weight == 0 {
            return;
        }
        self.add_scaled(weight.min(self.capacity) * TOKEN_SCALE);
    }

    fn available(&self) -> u32 {
        self.refill();
        self.tokens.load(Ordering::Relaxed) / TOKEN_SCALE
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn reset(&self) {
        let now = self.time_source.now_nanos();
        self.tokens.store(self.capacity * TOKEN_SCALE, Ordering::Release);
        self.last_refill.store(now, Ordering::Release);
    }
}

/// Builder for a token bucket
pub struct TokenBucketBuilder {
    capacity: Option<u32>,
    rate: Option<f64>,
}

impl TokenBucketBuilder {
    pub fn new() -> Self {
        Self { capacity: None, rate: None }
    }

    /// Maximum tokens (the largest single charge that can ever pass)
    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Refill rate in tokens per second
    pub fn rate_per_second(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Refill rate in tokens per minute
    pub fn rate_per_minute(mut self, rate: f64) -> Self {
        self.rate = Some(rate / 60.0);
        self
    }

    /// Refill one token every `interval`, as in a "one request per N ms" rule
    pub fn one_token_every(mut self, interval: Duration) -> Self {
        self.rate = Some(1.0 / interval.as_secs_f64());
        self
    }

    pub fn build(self) -> Result<TokenBucket> {
        let capacity = self.capacity.ok_or(RateLimitError::InvalidConfig("capacity must be set"))?;
        let rate = self.rate.ok_or(RateLimitError::InvalidConfig("refill rate must be set"))?;
        TokenBucket::new(capacity, rate)
    }
}

impl Default for TokenBucketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_refill_keeps_fractional_remainder() {
        // 20 weight/s, polled every ~1.05ms
        let rate_per_nano = 20 * TOKEN_SCALE as u64;
        let capacity_scaled = 1000 * TOKEN_SCALE;
        let poll = 1_049_999;

        let mut pending = 0u64;
        let mut earned_total = 0u64;
        for _ in 0..1000 {
            pending += poll;
            let (earned, consumed) = refill_step(pending, rate_per_nano, capacity_scaled);
            earned_total += earned as u64;
            pending -= consumed;
        }

        let one_shot = refill_step(1000 * poll, rate_per_nano, capacity_scaled).0 as u64;
        assert!(one_shot - earned_total <= 1, "polled {earned_total}, one shot {one_shot}");
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let (earned, consumed) = refill_step(60_000_000_000, 20 * TOKEN_SCALE as u64, 10 * TOKEN_SCALE);
        assert_eq!(earned, 10 * TOKEN_SCALE);
        assert_eq!(consumed, 60_000_000_000);
    }

    proptest! {
        #[test]
        fn prop_refill_never_consumes_more_than_elapsed(
            elapsed in 0u64..10_000_000_000,
            rate in 1u64..5_000_000,
            capacity in 1u32..4_000,
        ) {
            let (earned, consumed) = refill_step(elapsed, rate, capacity * TOKEN_SCALE);
            prop_assert!(consumed <= elapsed);
            prop_assert!(earned <= capacity * TOKEN_SCALE);
        }

        #[test]
        fn prop_available_never_exceeds_capacity(
            capacity in 1u32..2_000,
            ops in proptest::collection::vec((any::<bool>(), 0u32..3_000), 1..64),
        ) {
            let bucket = TokenBucket::new(capacity, 1_000.0).unwrap();
            for (charge, weight) in ops {
                if charge {
                    let _ = bucket.try_acquire(weight);
                } else {
                    bucket.refund(weight);
                }
                prop_assert!(bucket.available() <= capacity);
            }
        }
    }

    #[test]
    fn test_creation() {
        let bucket = TokenBucket::new(100, 50.0).unwrap();
        assert_eq!(bucket.capacity(), 100);
        assert_eq!(bucket.available(), 100);
        assert_eq!(bucket.rate(), 50.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(TokenBucket::new(0, 10.0), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(10, 0.0), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(10, f64::NAN), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::new(u32::MAX, 10.0), Err(RateLimitError::InvalidConfig(_))));
        assert!(matches!(TokenBucket::builder().capacity(10).build(), Err(RateLimitError::InvalidConfig(_))));
    }

    #[test]
    fn test_try_acquire() {
        let bucket = TokenBucket::new(10, 1.0).unwrap();

        assert!(bucket.try_acquire(1).is_ok());
        assert_eq!(bucket.available(), 9);

        assert!(bucket.try_acquire(5).is_ok());
        assert_eq!(bucket.available(), 4);
    }

    #[test]
    fn test_exceeds_limit() {
        let bucket = TokenBucket::new(5, 1.0).unwrap();

        assert!(bucket.try_acquire(5).is_ok());
        assert!(matches!(bucket.try_acquire(1), Err(RateLimitError::Exceeded)));
    }

    #[test]
    fn test_weight_above_capacity() {
        let bucket = TokenBucket::new(100, 20.0).unwrap();

        assert_eq!(bucket.try_acquire(101), Err(RateLimitError::WeightExceedsCapacity { weight: 101, capacity: 100 }));
        assert_eq!(bucket.available(), 100);
    }

    #[tokio::test]
    async fn test_acquire_above_capacity_fails_fast() {
        let bucket = TokenBucket::new(10, 1.0).unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), bucket.acquire(11)).await;
        assert!(matches!(result, Ok(Err(RateLimitError::WeightExceedsCapacity { .. }))));
    }

    #[test]
    fn test_refill() {
        let bucket = TokenBucket::new(100, 100.0).unwrap();

        assert!(bucket.try_acquire(100).is_ok());
        assert_eq!(bucket.available(), 0);

        std::thread::sleep(Duration::from_millis(200));

        // ~20 tokens at 100/sec
        let available = bucket.available();
        assert!((15..=30).contains(&available), "Expected ~20, got {available}");
    }

    #[test]
    fn test_refund() {
        let bucket = TokenBucket::new(10, 0.01).unwrap();

        assert!(bucket.try_acquire(8).is_ok());
        bucket.refund(5);
        assert_eq!(bucket.available(), 7);

        // Never above capacity
        bucket.refund(100);
        assert_eq!(bucket.available(), 10);
    }

    #[test]
    fn test_builder_rates() {
        let bucket = TokenBucket::builder().capacity(200).rate_per_second(100.0).build().unwrap();
        assert_eq!(bucket.capacity(), 200);
        assert_eq!(bucket.rate(), 100.0);

        let bucket = TokenBucket::builder().capacity(120).rate_per_minute(60.0).build().unwrap();
        assert_eq!(bucket.rate(), 1.0);

        // One weight unit every 50ms is 20 per second
        let bucket = TokenBucket::builder().capacity(1000).one_token_every(Duration::from_millis(50)).build().unwrap();
        assert_eq!(bucket.rate(), 20.0);
    }

    #[test]
    fn test_wait_hint_tracks_deficit() {
        let bucket = TokenBucket::new(1000, 20.0).unwrap();
        assert!(bucket.try_acquire(1000).is_ok());

        // 1 token at 20/sec is 50ms
        let hint = bucket.wait_hint(1);
        assert!(hint <= Duration::from_millis(50) && hint > Duration::from_millis(40), "got {hint:?}");

        // Long waits are chunked
        assert_eq!(bucket.wait_hint(1000), MAX_WAIT);
    }

    #[test]
    fn test_reset() {
        let bucket = TokenBucket::new(10, 1.0).unwrap();

        assert!(bucket.try_acquire(5).is_ok());
        assert_eq!(bucket.available(), 5);

        bucket.reset();
        assert_eq!(bucket.available(), 10);
    }

    #[test]
    fn test_zero_weight() {
        let bucket = TokenBucket::new(10, 1.0).unwrap();
        assert!(bucket.try_acquire(0).is_ok());
        assert_eq!(bucket.available(), 10);
    }

    #[tokio::test]
    async fn test_async_acquire() {
        let bucket = TokenBucket::new(10, 100.0).unwrap();

        assert!(bucket.try_acquire(10).is_ok());

        // ~10ms to refill one token
        let result = tokio::time::timeout(Duration::from_millis(500), bucket.acquire(1)).await;
        assert!(matches!(result, Ok(Ok(()))), "Async acquire timed out");
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;

        let bucket = Arc::new(TokenBucket::new(1000, 0.01).unwrap());
        let mut handles = vec![];

        for _ in 0..10 {
            let bucket = Arc::clone(&bucket);
            handles.push(std::thread::spawn(move || {
                let mut acquired = 0;
                for _ in 0..150 {
                    if bucket.try_acquire(1).is_ok() {
                        acquired += 1;
                    }
                }
                acquired
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 1000);
    }
}
