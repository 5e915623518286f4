use std::fmt;

/// Result type for rate limiting operations
pub type Result<T> = std::result::Result<T, RateLimitError>;

/// Errors that can occur while charging a limiter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    /// Not enough weight left right now
    Exceeded,

    /// The charge can never fit, even into a full limiter
    WeightExceedsCapacity { weight: u32, capacity: u32 },

    /// Invalid configuration
    InvalidConfig(&'static str),
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::Exceeded => write!(f, "Rate limit exceeded"),
            RateLimitError::WeightExceedsCapacity { weight, capacity } => {
                write!(f, "Request weight {} exceeds limiter capacity {}", weight, capacity)
            }
            RateLimitError::InvalidConfig(msg) => write!(f, "Invalid rate limiter configuration: {}", msg),
        }
    }
}

impl std::error::Error for RateLimitError {}
