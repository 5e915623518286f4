//! # lq_endpoints
//!
//! REST endpoint registry for the Liqi exchange: which operations exist,
//! their access tier, HTTP method and rate-limit cost.

pub mod descriptor;
pub mod error;
pub mod exchange;
pub mod registry;

pub use descriptor::AccessTier;
pub use descriptor::Cost;
pub use descriptor::EndpointDescriptor;
pub use descriptor::HttpMethod;
pub use descriptor::Operation;
pub use error::EndpointError;
pub use error::Result;
pub use exchange::Timeframe;
pub use registry::EndpointRegistry;
