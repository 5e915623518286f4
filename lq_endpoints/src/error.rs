use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Unknown access tier: {0}")]
    UnknownTier(String),

    #[error("Unknown HTTP method: {0}")]
    UnknownMethod(String),

    #[error("Unknown timeframe: {0}")]
    UnknownTimeframe(String),

    #[error("Key {key} is claimed by both {first} and {second}")]
    DuplicateKey { key: String, first: &'static str, second: &'static str },
}

pub type Result<T> = std::result::Result<T, EndpointError>;
