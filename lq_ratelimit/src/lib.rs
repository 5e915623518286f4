//! # lq_ratelimit
//!
//! Client-side weight limiters. Every REST call charges its endpoint cost
//! here before it is sent.

pub mod error;
pub mod exchanges;
pub mod fixed_window;
pub mod limiter;
pub mod multi_limiter;
pub mod token_bucket;
mod time;

pub use error::RateLimitError;
pub use error::Result;
pub use fixed_window::FixedWindow;
pub use limiter::RateLimiter;
pub use multi_limiter::MultiLimiter;
pub use multi_limiter::MultiLimiterBuilder;
pub use token_bucket::TokenBucket;
pub use token_bucket::TokenBucketBuilder;
