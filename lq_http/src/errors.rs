use lq_ratelimit::RateLimitError;
use thiserror::Error;

use crate::exceptions::ErrorKind;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Rate limiter rejected request: {0}")]
    RateLimiter(#[from] RateLimitError),

    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("{operation} requires a {argument} argument")]
    ArgumentsRequired { operation: &'static str, argument: &'static str },

    #[error("liqi {kind}: {message}")]
    Exchange { kind: ErrorKind, message: String },

    #[error("Signing failed: {0}")]
    Signing(String),
}

impl HttpError {
    /// Exchange error category, if the exchange reported this failure
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            HttpError::Exchange { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the failure counts against the circuit breaker
    pub fn trips_circuit(&self) -> bool {
        match self {
            HttpError::RequestFailed(_) | HttpError::Timeout(_) | HttpError::InvalidResponse(_) => true,
            HttpError::Exchange { kind, .. } => kind.is_outage(),
            _ => false,
        }
    }

    /// Whether the exchange answered, even if with a rejection
    pub fn is_exchange_reply(&self) -> bool {
        matches!(self, HttpError::Exchange { .. } | HttpError::JsonError(_))
    }
}

pub type Result<T> = std::result::Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outage_trips_circuit() {
        let err = HttpError::Exchange { kind: ErrorKind::OnMaintenance, message: "System is under maintenance.".into() };
        assert!(err.trips_circuit());
        assert_eq!(err.kind(), Some(ErrorKind::OnMaintenance));
    }

    #[test]
    fn test_rejection_does_not_trip_circuit() {
        let err = HttpError::Exchange { kind: ErrorKind::InsufficientFunds, message: "no funds".into() };
        assert!(!err.trips_circuit());
        assert!(err.is_exchange_reply());
    }

    #[test]
    fn test_local_errors_are_neutral() {
        let err = HttpError::ArgumentsRequired { operation: "fetchOrders", argument: "symbol" };
        assert!(!err.trips_circuit());
        assert!(!err.is_exchange_reply());
        assert_eq!(err.to_string(), "fetchOrders requires a symbol argument");

        assert!(!HttpError::RateLimitExceeded.trips_circuit());
    }
}
