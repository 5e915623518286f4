use std::future::Future;
use std::pin::Pin;

use lq_endpoints::EndpointDescriptor;

use crate::error::Result;

/// Boxed future returned by [`RateLimiter::acquire`]
pub type AcquireFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Core trait for all rate limiting implementations
pub trait RateLimiter: Send + Sync {
    /// Try to take `weight` units without blocking
    fn try_acquire(&self, weight: u32) -> Result<()>;

    /// Wait until `weight` units are available, then take them
    ///
    /// Fails immediately with `WeightExceedsCapacity` if `weight` can never fit.
    fn acquire(&self, weight: u32) -> AcquireFuture<'_>;

    /// Give back units taken by a request that was never sent
    fn refund(&self, weight: u32);

    /// Units that could be taken right now
    fn available(&self) -> u32;

    /// Maximum units the limiter can hold
    fn capacity(&self) -> u32;

    /// Restore the limiter to its initial, full state
    fn reset(&self);

    /// Charge an endpoint's cost without blocking
    fn try_charge(&self, endpoint: &EndpointDescriptor) -> Result<()> {
        self.try_acquire(endpoint.cost.get())
    }

    /// Wait for and charge an endpoint's cost
    fn charge(&self, endpoint: &EndpointDescriptor) -> AcquireFuture<'_> {
        self.acquire(endpoint.cost.get())
    }
}
