//! # Edge Gateway Library
//!
//! An edge gateway that fronts three backend services: a general API
//! backend, a messaging-publisher service, and an identity service. Inbound
//! requests are authenticated against a signed-token scheme plus a live
//! identity lookup, enriched with verified identity headers, and forwarded
//! unmodified to the backend selected by path prefix.
//!
//! The crate deliberately does not load-balance, retry, circuit-break, or
//! cache: each request is one independent pipeline execution against exactly
//! one upstream.

/// Core functionality: error taxonomy, configuration, and shared data types
pub mod core;

/// Authentication: token verification, identity resolution, and the
/// decision engine that stamps trusted identity headers
pub mod auth;

/// Ordered, data-driven route table mapping requests to upstream targets
pub mod routing;

/// Streaming proxy adapter for forwarding requests to upstreams
pub mod proxy;

/// The HTTP server and per-request pipeline wiring
pub mod gateway;

/// Main error type used throughout the gateway
pub use crate::core::error::{GatewayError, GatewayResult};

/// Main configuration structure for the gateway
pub use crate::core::config::GatewayConfig;

/// Compiled route table
pub use crate::routing::RouteTable;

/// Server entry points
pub use crate::gateway::{build_app, GatewayServer};
