#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # ratelimiter-client
//!
//! Async client for a remote rate-limiter service: register rate rules, then ask the service
//! whether a request may proceed.
//!
//! ## Features
//!
//! - **Rule registration**: single rules, batches, `id -> "5/m"` maps, and rule trees
//! - **Permit acquisition**: availability checks and synchronous or asynchronous acquisition
//! - **Request snapshots** sent with each check so the service can evaluate conditions
//! - **Registration cache** so each rule is registered once per client
//! - **Failure policies** for the convenience path (fail-open by default)
//! - **Tower middleware** for `http::Request` services
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ratelimiter_client::{RateLimiterClient, StaticRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ratelimiter_client::ClientError> {
//!     let client = RateLimiterClient::new("http://localhost:8080")?;
//!
//!     let request = StaticRequest::new("POST", "/login").header("X-Forwarded-For", "10.0.0.7");
//!     if client.check_limit(Some(&request), "login", "5/m").await {
//!         // serve the request
//!     }
//!
//!     // Strict calls surface every failure.
//!     let available = client.is_permit_available("login", None).await?;
//!     println!("login permit available: {available}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod middleware;
pub mod model;
pub mod policy;
pub mod prelude;
pub mod snapshot;
pub mod transport;

// Re-exports
pub use cache::{InMemoryRegistrationCache, RegistrationCache};
pub use client::{ClientBuilder, RateLimiterClient};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError};
pub use error::{ClientError, ServerFault, TransportError, ValidationError};
pub use middleware::{LimitError, RemoteRateLimitLayer, RemoteRateLimitService};
pub use model::{Operator, RateExpr, RateLimit, RateRule, RateTree, RateUnit};
pub use policy::{FailClosed, FailOpen, FailurePolicy};
pub use snapshot::{RequestSnapshot, RequestSource, StaticRequest};
pub use transport::{HttpRequest, HttpResponse, Method, Transport};

#[cfg(feature = "http-client")]
pub use transport::HttpTransport;
