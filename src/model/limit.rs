use super::RateExpr;
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_DURATION: Duration = Duration::from_secs(1);

fn default_duration() -> Duration {
    DEFAULT_DURATION
}

/// A single quota: either a textual rate expression or an explicit permits/duration pair.
///
/// Exactly one of the two forms must be populated; [`RateLimit::validate`] enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    /// Rate expression such as `"5/m"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    /// Explicit permit count, used together with `duration`.
    #[serde(default)]
    pub permits: u64,
    /// Period over which `permits` apply.
    #[serde(default = "default_duration", with = "super::duration")]
    pub duration: Duration,
    /// Condition expression evaluated by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Fully qualified name of a server-side limiter factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_class: Option<String>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self { rate: None, permits: 0, duration: DEFAULT_DURATION, when: None, factory_class: None }
    }
}

impl RateLimit {
    /// Limit given as a rate expression, e.g. `RateLimit::of("5/m")`.
    pub fn of(rate: impl Into<String>) -> Self {
        Self { rate: Some(rate.into()), ..Self::default() }
    }

    /// Limit given as `permits` per `duration`.
    pub fn per(permits: u64, duration: Duration) -> Self {
        Self { permits, duration, ..Self::default() }
    }

    /// Attach a condition; the limit only applies when it holds.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.when = Some(condition.into());
        self
    }

    pub fn with_factory_class(mut self, factory_class: impl Into<String>) -> Self {
        self.factory_class = Some(factory_class.into());
        self
    }

    /// The rate expression, treating an empty string as absent.
    pub fn rate_expression(&self) -> Option<&str> {
        self.rate.as_deref().filter(|r| !r.is_empty())
    }

    /// The condition, treating an empty string as absent.
    pub fn condition(&self) -> Option<&str> {
        self.when.as_deref().filter(|w| !w.is_empty())
    }

    /// Check that exactly one of {rate expression, permits} is set, that permits come with a
    /// non-zero duration, and that the expression and any factory name are well formed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.rate_expression(), self.permits) {
            (None, 0) => return Err(ValidationError::RateOrPermitsRequired),
            (Some(rate), permits) if permits > 0 => {
                return Err(ValidationError::RateAndPermitsBoth { rate: rate.to_string(), permits })
            }
            (Some(rate), _) => {
                rate.parse::<RateExpr>()?;
            }
            (None, permits) if self.duration.is_zero() => {
                return Err(ValidationError::ZeroDuration { permits })
            }
            (None, _) => {}
        }
        if let Some(factory) = self.factory_class.as_deref().filter(|f| !f.is_empty()) {
            if !is_qualified_name(factory) {
                return Err(ValidationError::InvalidFactoryClass(factory.to_string()));
            }
        }
        Ok(())
    }
}

/// `a.b.C` style name: dot-separated segments of identifier characters, none starting with a digit.
fn is_qualified_name(name: &str) -> bool {
    name.split('.').all(|segment| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {
                chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
            }
            _ => false,
        }
    })
}
