//! Clients for external services
//!
//! - Endpoint: the local streaming/transcoding server's track inspection call

pub mod endpoint;

pub use endpoint::StreamEndpointClient;
