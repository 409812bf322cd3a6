//! Failure policies for the convenience entry points.
//!
//! [`RateLimiterClient::check_limit`](crate::RateLimiterClient::check_limit) and
//! [`try_to_acquire_permit_quietly`](crate::RateLimiterClient::try_to_acquire_permit_quietly)
//! never return an error. When registration or acquisition fails they hand the error to a
//! [`FailurePolicy`], whose answer becomes the permit decision. Strict entry points never
//! consult the policy.

use crate::error::ClientError;
use crate::snapshot::RequestSnapshot;
use tracing::warn;

/// Decide the permit outcome when a remote call fails.
pub trait FailurePolicy: Send + Sync + std::fmt::Debug {
    /// Called with a label for the failed step (`"Post rate"`, `"Acquire permit"`), the error,
    /// the rate id, and the request being limited, if any. Returns whether the permit is granted.
    fn on_error(
        &self,
        action: &str,
        error: &ClientError,
        rate_id: &str,
        request: Option<&RequestSnapshot>,
    ) -> bool;
}

/// Log and grant the permit: a rate-limiter outage never blocks traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailOpen;

impl FailurePolicy for FailOpen {
    fn on_error(
        &self,
        action: &str,
        error: &ClientError,
        rate_id: &str,
        request: Option<&RequestSnapshot>,
    ) -> bool {
        log_failure(action, error, rate_id, request, true);
        true
    }
}

/// Log and deny the permit.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailClosed;

impl FailurePolicy for FailClosed {
    fn on_error(
        &self,
        action: &str,
        error: &ClientError,
        rate_id: &str,
        request: Option<&RequestSnapshot>,
    ) -> bool {
        log_failure(action, error, rate_id, request, false);
        false
    }
}

fn log_failure(
    action: &str,
    error: &ClientError,
    rate_id: &str,
    request: Option<&RequestSnapshot>,
    granted: bool,
) {
    let method = request.and_then(RequestSnapshot::method).unwrap_or("-");
    let uri = request.and_then(RequestSnapshot::request_uri).unwrap_or("-");
    warn!(
        target: "ratelimiter_client::policy",
        action = %action,
        rate_id = %rate_id,
        method = %method,
        uri = %uri,
        granted,
        error = %error,
        "{} error",
        action
    );
}
