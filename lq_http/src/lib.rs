//! Liqi REST client
//!
//! Resolves operations through the endpoint registry, charges their cost on
//! a rate limiter, signs private requests and maps exchange error replies.

pub mod circuit_breaker;
pub mod client;
pub mod errors;
pub mod exceptions;
pub mod liqi;
pub mod sign;

pub use circuit_breaker::CircuitBreaker;
pub use circuit_breaker::CircuitBreakerConfig;
pub use client::HttpClient;
pub use client::HttpClientConfig;
pub use errors::HttpError;
pub use errors::Result;
pub use exceptions::ErrorKind;
pub use liqi::LiqiClient;
pub use liqi::LiqiClientBuilder;
pub use liqi::OrderRequest;
pub use liqi::OrderSide;
pub use liqi::OrderType;
pub use liqi::RateLimitMode;
pub use sign::Credentials;
pub use sign::Params;
