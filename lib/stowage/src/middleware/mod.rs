//! Tower middleware layers for the stowage transport.
//!
//! Layers wrap the boxed transport service built by
//! [`HyperTransportBuilder`](crate::HyperTransportBuilder). They are applied in
//! reverse order: the last layer added is the first to process requests.
//!
//! # Available Layers
//!
//! - [`LoggingLayer`] - Logs requests/responses using `tracing`
//! - [`SignLayer`] - Hands every outgoing request to a [`RequestSigner`]
//! - [`ConcurrencyLimitLayer`] - Limits concurrent requests (from tower)
//!
//! The dispatcher never retries; a retry policy, if wanted, belongs in a
//! custom layer.
//!
//! # Example
//!
//! ```ignore
//! use stowage::HyperTransport;
//! use stowage::middleware::LoggingLayer;
//!
//! let transport = HyperTransport::builder()
//!     .with_signer(my_signer)
//!     .layer(LoggingLayer::debug())
//!     .build();
//! ```

mod logging;
mod signing;

pub use logging::{LogLevel, Logging, LoggingLayer};
pub use signing::{RequestSigner, Sign, SignLayer};

// Re-export tower types for convenience
pub use tower::limit::ConcurrencyLimitLayer;
pub use tower::{Layer, ServiceBuilder};
