//! Convenient re-exports for common client types.
pub use crate::{
    cache::{InMemoryRegistrationCache, RegistrationCache},
    client::{ClientBuilder, RateLimiterClient},
    config::ClientConfig,
    error::{ClientError, ServerFault, TransportError, ValidationError},
    middleware::{LimitError, RemoteRateLimitLayer},
    model::{Operator, RateLimit, RateRule, RateTree},
    policy::{FailClosed, FailOpen, FailurePolicy},
    snapshot::{RequestSnapshot, RequestSource, StaticRequest},
    transport::Transport,
};

#[cfg(feature = "http-client")]
pub use crate::transport::HttpTransport;
