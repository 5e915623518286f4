//! Liqi rate limit presets
//!
//! Liqi advertises one weight-1 request every `rateLimit` milliseconds
//! (50 ms). Each endpoint carries a cost from 1 to 1000, so a full
//! `fetchOHLCV` drains what twenty seconds of refill provide.
//!
//! The weight bucket is sized to the heaviest endpoint in the registry so
//! every call can eventually pass, and a per-second request counter caps
//! bursts of cheap calls.

use lq_endpoints::EndpointRegistry;
use lq_endpoints::exchange;

use crate::FixedWindow;
use crate::MultiLimiter;
use crate::TokenBucket;
use crate::error::RateLimitError;
use crate::error::Result;

/// Limits matching the exchange's advertised pacing
pub fn rest_limits() -> Result<MultiLimiter> {
    rest_limits_with_interval(exchange::RATE_LIMIT_MS)
}

/// Limits for a custom spacing between weight-1 requests
pub fn rest_limits_with_interval(rate_limit_ms: u64) -> Result<MultiLimiter> {
    if rate_limit_ms == 0 {
        return Err(RateLimitError::InvalidConfig("rate limit interval must be greater than 0"));
    }

    let weight_per_second = 1000.0 / rate_limit_ms as f64;
    let requests_per_second = (1000 / rate_limit_ms).max(1) as u32;

    Ok(MultiLimiter::builder()
        .with_limiter(weight_bucket(weight_per_second)?)
        .with_request_counter(FixedWindow::per_second(requests_per_second)?)
        .build())
}

/// Two thirds of the advertised refill rate
pub fn rest_limits_conservative() -> Result<MultiLimiter> {
    let weight_per_second = 1000.0 / exchange::RATE_LIMIT_MS as f64 * 2.0 / 3.0;
    let requests_per_second = (1000 / exchange::RATE_LIMIT_MS) as u32 * 2 / 3;

    Ok(MultiLimiter::builder()
        .with_limiter(weight_bucket(weight_per_second)?)
        .with_request_counter(FixedWindow::per_second(requests_per_second)?)
        .build())
}

/// Weight bucket with a custom per-minute budget
///
/// Capacity never drops below the heaviest endpoint cost.
pub fn custom_weight_limit(weight_per_minute: u32) -> Result<TokenBucket> {
    let capacity = weight_per_minute.max(EndpointRegistry::liqi().max_cost());
    TokenBucket::builder().capacity(capacity).rate_per_minute(weight_per_minute as f64).build()
}

fn weight_bucket(weight_per_second: f64) -> Result<TokenBucket> {
    TokenBucket::builder().capacity(EndpointRegistry::liqi().max_cost()).rate_per_second(weight_per_second).build()
}
