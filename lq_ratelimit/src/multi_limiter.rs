use std::sync::Arc;

use crate::error::RateLimitError;
use crate::error::Result;
use crate::limiter::AcquireFuture;
use crate::limiter::RateLimiter;

/// How a member limiter is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charge {
    /// The full request weight (endpoint cost)
    Weight,
    /// One unit per request, whatever its weight
    Request,
}

impl Charge {
    #[inline]
    fn units(self, weight: u32) -> u32 {
        match self {
            Charge::Weight => weight,
            Charge::Request => weight.min(1),
        }
    }
}

/// Several limiters that must all admit a request
///
/// Typical use pairs a weight bucket (endpoint cost) with a raw request
/// counter. A charge either lands on every limiter or on none: if a later
/// limiter refuses, the earlier ones are refunded.
pub struct MultiLimiter {
    limiters: Vec<(Arc<dyn RateLimiter>, Charge)>,
}

impl MultiLimiter {
    pub fn builder() -> MultiLimiterBuilder {
        MultiLimiterBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    fn refund_prefix(&self, taken: usize, weight: u32) {
        for (limiter, charge) in &self.limiters[..taken] {
            limiter.refund(charge.units(weight));
        }
    }
}

impl RateLimiter for MultiLimiter {
    fn try_acquire(&self, weight: u32) -> Result<()> {
        for (position, (limiter, charge)) in self.limiters.iter().enumerate() {
            if let Err(err) = limiter.try_acquire(charge.units(weight)) {
                self.refund_prefix(position, weight);
                return Err(err);
            }
        }
        Ok(())
    }

    fn acquire(&self, weight: u32) -> AcquireFuture<'_> {
        Box::pin(async move {
            // Reject impossible charges before any waiting
            for (limiter, charge) in &self.limiters {
                let units = charge.units(weight);
                let capacity = limiter.capacity();
                if units > capacity {
                    return Err(RateLimitError::WeightExceedsCapacity { weight: units, capacity });
                }
            }

            for (position, (limiter, charge)) in self.limiters.iter().enumerate() {
                if let Err(err) = limiter.acquire(charge.units(weight)).await {
                    self.refund_prefix(position, weight);
                    return Err(err);
                }
            }
            Ok(())
        })
    }

    fn refund(&self, weight: u32) {
        self.refund_prefix(self.limiters.len(), weight);
    }

    /// Weight that could pass right now; 0 if a request counter is exhausted
    fn available(&self) -> u32 {
        self.limiters
            .iter()
            .map(|(limiter, charge)| match charge {
                Charge::Weight => limiter.available(),
                Charge::Request if limiter.available() == 0 => 0,
                Charge::Request => u32::MAX,
            })
            .min()
            .unwrap_or(u32::MAX)
    }

    /// Largest single weight any weighted member can hold; `u32::MAX` when none
    fn capacity(&self) -> u32 {
        self.limiters.iter().filter(|(_, charge)| *charge == Charge::Weight).map(|(limiter, _)| limiter.capacity()).min().unwrap_or(u32::MAX)
    }

    fn reset(&self) {
        for (limiter, _) in &self.limiters {
            limiter.reset();
        }
    }
}

pub struct MultiLimiterBuilder {
    limiters: Vec<(Arc<dyn RateLimiter>, Charge)>,
}

impl MultiLimiterBuilder {
    pub fn new() -> Self {
        Self { limiters: Vec::new() }
    }

    /// Add a limiter charged with the full request weight
    ///
    /// Limiters are charged in insertion order.
    pub fn with_limiter<L: RateLimiter + 'static>(mut self, limiter: L) -> Self {
        self.limiters.push((Arc::new(limiter), Charge::Weight));
        self
    }

    /// Add a weighted limiter shared with other clients
    pub fn with_limiter_arc(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiters.push((limiter, Charge::Weight));
        self
    }

    /// Add a limiter charged one unit per request
    pub fn with_request_counter<L: RateLimiter + 'static>(mut self, limiter: L) -> Self {
        self.limiters.push((Arc::new(limiter), Charge::Request));
        self
    }

    pub fn build(self) -> MultiLimiter {
        MultiLimiter { limiters: self.limiters }
    }
}

impl Default for MultiLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
