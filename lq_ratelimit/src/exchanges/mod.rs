//! Pre-configured limiters derived from exchange endpoint tables
//!
//! # Supported Exchanges
//!
//! - **Liqi**: weight bucket sized to the heaviest endpoint plus a raw request counter

pub mod liqi;
