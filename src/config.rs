//! Client configuration.
//!
//! ```rust
//! use ratelimiter_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder("http://localhost:8080")
//!     .connect_timeout(Duration::from_secs(2))
//!     .read_timeout(Duration::from_secs(5))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.base_url().as_str(), "http://localhost:8080/");
//! ```

use std::time::Duration;
use url::Url;

/// Default connect and read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Environment variable holding the service base URL.
pub const ENV_SERVICE_URL: &str = "RATELIMITER_SERVICE_URL";
/// Environment variable overriding the connect timeout, in milliseconds.
pub const ENV_CONNECT_TIMEOUT_MS: &str = "RATELIMITER_CONNECT_TIMEOUT_MS";
/// Environment variable overriding the read timeout, in milliseconds.
pub const ENV_READ_TIMEOUT_MS: &str = "RATELIMITER_READ_TIMEOUT_MS";

/// Where the service lives and how long a round trip may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: Url,
    connect_timeout: Duration,
    read_timeout: Duration,
    user_agent: String,
}

impl ClientConfig {
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Read configuration from `RATELIMITER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (environment, settings file, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_SERVICE_URL).ok_or(ConfigError::Missing(ENV_SERVICE_URL))?;
        let mut builder = Self::builder(base_url);
        if let Some(ms) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            builder = builder.connect_timeout(parse_millis(ENV_CONNECT_TIMEOUT_MS, &ms)?);
        }
        if let Some(ms) = lookup(ENV_READ_TIMEOUT_MS) {
            builder = builder.read_timeout(parse_millis(ENV_READ_TIMEOUT_MS, &ms)?);
        }
        builder.build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Same configuration with both connect and read timeouts replaced.
    pub fn with_timeout(&self, timeout: Duration) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("timeout"));
        }
        Ok(Self { connect_timeout: timeout, read_timeout: timeout, ..self.clone() })
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidNumber { key, value: value.to_string() })
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    user_agent: String,
}

impl ClientConfigBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("ratelimiter-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        let base_url = Url::parse(self.base_url.trim())
            .map_err(|e| ConfigError::InvalidUrl { url: self.base_url.clone(), reason: e.to_string() })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: self.base_url,
                reason: format!("unsupported scheme '{}'", base_url.scheme()),
            });
        }
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidUrl { url: self.base_url, reason: "not a base url".into() });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("connect_timeout"));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("read_timeout"));
        }
        Ok(ClientConfig {
            base_url,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            user_agent: self.user_agent,
        })
    }
}

/// Errors produced while building a [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("{0} must be > 0")]
    ZeroTimeout(&'static str),
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("{key} must be a number of milliseconds (got '{value}')")]
    InvalidNumber { key: &'static str, value: String },
}
