use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::AcquireFuture;
use crate::limiter::RateLimiter;
use crate::time::TimeSource;

/// Call counter that empties at fixed window boundaries
///
/// Paired with the weight bucket as a request counter: every call takes one
/// unit here whatever its endpoint cost.
pub struct FixedWindow {
    used: AtomicU32,
    started_at: AtomicU64,
    limit: u32,
    window_nanos: u64,
    clock: TimeSource,
}

impl FixedWindow {
    pub fn new(limit: u32, window: Duration) -> Result<Self> {
        if limit == 0 {
            return Err(RateLimitError::InvalidConfig("limit must be greater than 0"));
        }
        if window.is_zero() {
            return Err(RateLimitError::InvalidConfig("window duration must be greater than 0"));
        }

        let clock = TimeSource::new();
        Ok(Self {
            used: AtomicU32::new(0),
            started_at: AtomicU64::new(clock.now_nanos()),
            limit,
            window_nanos: window.as_nanos() as u64,
            clock,
        })
    }

    pub fn per_second(limit: u32) -> Result<Self> {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn per_minute(limit: u32) -> Result<Self> {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Start a new window once the current one has elapsed
    ///
    /// Window starts stay on multiples of the window length, so an idle
    /// period never shifts the boundaries.
    #[inline]
    fn roll(&self) {
        let started = self.started_at.load(Ordering::Acquire);
        let elapsed = self.clock.now_nanos().saturating_sub(started);
        if elapsed < self.window_nanos {
            return;
        }

        let next = started + elapsed - elapsed % self.window_nanos;
        if self.started_at.compare_exchange(started, next, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
            self.used.store(0, Ordering::Release);
        }
    }

    fn until_next_window(&self) -> Duration {
        let elapsed = self.clock.now_nanos().saturating_sub(self.started_at.load(Ordering::Acquire));
        // Floor of 1µs so a waiter never spins on a zero sleep
        Duration::from_nanos(self.window_nanos.saturating_sub(elapsed).max(1_000))
    }
}

impl RateLimiter for FixedWindow {
    #[inline]
    fn try_acquire(&self, weight: u32) -> Result<()> {
        if weight == 0 {
            return Ok(());
        }
        if weight > self.limit {
            return Err(RateLimitError::WeightExceedsCapacity { weight, capacity: self.limit });
        }

        self.roll();
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                let next = used.saturating_add(weight);
                (next <= self.limit).then_some(next)
            })
            .map(|_| ())
            .map_err(|_| RateLimitError::Exceeded)
    }

    fn acquire(&self, weight: u32) -> AcquireFuture<'_> {
        Box::pin(async move {
            loop {
                match self.try_acquire(weight) {
                    Err(RateLimitError::Exceeded) => {
                        let delay = self.until_next_window();
                        tracing::trace!(weight, ?delay, "request window full");
                        tokio::time::sleep(delay).await;
                    }
                    other => return other,
                }
            }
        })
    }

    fn refund(&self, weight: u32) {
        let _ = self.used.fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| Some(used.saturating_sub(weight)));
    }

    fn available(&self) -> u32 {
        self.roll();
        self.limit.saturating_sub(self.used.load(Ordering::Acquire))
    }

    fn capacity(&self) -> u32 {
        self.limit
    }

    fn reset(&self) {
        self.used.store(0, Ordering::Release);
        self.started_at.store(self.clock.now_nanos(), Ordering::Release);
    }
}
