//! Error types for the rate-limiter client.
//!
//! Failures fall into three families that callers can match on:
//! - [`TransportError`]: no response was obtained (connect failure, transport deadline, I/O).
//! - [`ServerFault`]: the service answered with a non-2xx status, or with an empty body where
//!   one was required.
//! - [`ValidationError`]: a rule was rejected locally before any request was sent.
//!
//! A caller-supplied deadline on a bounded call is reported as [`ClientError::Timeout`], which
//! is never confused with a transport-level timeout.
use std::fmt;
use std::time::Duration;

/// Boxed source error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all client operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// No response was obtained from the service.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The service responded with an error status or an unusable body.
    #[error(transparent)]
    Server(#[from] ServerFault),
    /// A rate rule failed local validation; nothing was sent.
    #[error("invalid rate rule: {0}")]
    Validation(#[from] ValidationError),
    /// A caller-specified deadline elapsed before the response arrived.
    #[error("operation timed out after {elapsed:?} (limit: {timeout:?})")]
    Timeout { elapsed: Duration, timeout: Duration },
    /// The request payload could not be encoded as JSON.
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    /// The response payload could not be decoded.
    #[error("failed to decode response body: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    /// A request URL could not be derived from the configured base URL.
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
    /// The client could not be configured.
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl ClientError {
    /// Check if a caller-specified deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check if no response was obtained.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Check if the service reported a fault.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Check if a rule was rejected locally.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Borrow the server fault if present.
    pub fn server_fault(&self) -> Option<&ServerFault> {
        match self {
            Self::Server(fault) => Some(fault),
            _ => None,
        }
    }

    /// HTTP status code of a server fault, if this is one.
    pub fn status_code(&self) -> Option<u16> {
        self.server_fault().map(|f| f.code)
    }

    /// Access timeout details as `(elapsed, timeout)`.
    pub fn timeout_details(&self) -> Option<(Duration, Duration)> {
        match self {
            Self::Timeout { elapsed, timeout } => Some((*elapsed, *timeout)),
            _ => None,
        }
    }
}

/// Error response from the rate-limiter service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFault {
    /// HTTP status code.
    pub code: u16,
    /// HTTP status message (reason phrase).
    pub message: String,
    /// Raw response body, if any was sent.
    pub body: Option<String>,
}

impl ServerFault {
    pub fn new(code: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self { code, message: message.into(), body }
    }
}

impl fmt::Display for ServerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "server fault {} {}", self.code, self.message)?;
        match self.body.as_deref() {
            Some(body) if !body.is_empty() => write!(f, ": {}", body),
            _ => Ok(()),
        }
    }
}

impl std::error::Error for ServerFault {}

/// Failure to obtain any response from the service.
#[derive(Debug)]
pub struct TransportError {
    message: String,
    timed_out: bool,
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), timed_out: false, source: None }
    }

    /// A transport-level deadline (connect/read timeout) elapsed.
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self { timed_out: true, ..Self::new(message) }
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Whether the transport gave up because its own deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        self.timed_out
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timed_out {
            write!(f, "transport timed out: {}", self.message)
        } else {
            write!(f, "transport failure: {}", self.message)
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Locally detected problems with a rate rule or rate limit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("rate rule id is required")]
    EmptyId,
    #[error("rate rule '{id}' has no rates")]
    NoRates { id: String },
    #[error("rate rule '{id}' has {count} rates; an operator is required when there is more than one")]
    OperatorRequired { id: String, count: usize },
    #[error("specify either rate or permits")]
    RateOrPermitsRequired,
    #[error("specify either rate or permits, not both (rate: '{rate}', permits: {permits})")]
    RateAndPermitsBoth { rate: String, permits: u64 },
    #[error("{permits} permits need a non-zero duration")]
    ZeroDuration { permits: u64 },
    #[error("invalid rate expression '{expression}': {reason}")]
    InvalidRateExpression { expression: String, reason: String },
    #[error("invalid factory class: {0}")]
    InvalidFactoryClass(String),
    #[error("child rule id '{0}' clashes with a rule field")]
    ReservedChildId(String),
}
