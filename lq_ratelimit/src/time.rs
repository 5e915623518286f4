use std::time::Instant;

/// Monotonic clock relative to the limiter's creation
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimeSource {
    epoch: Instant,
}

impl TimeSource {
    #[inline(always)]
    pub fn new() -> Self {
        Self { epoch: Instant::now() }
    }

    /// Nanoseconds since the epoch
    #[inline(always)]
    pub fn now_nanos(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::new()
    }
}
