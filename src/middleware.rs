//! Tower middleware that gates `http::Request`s on a remote rate limit.
//!
//! ```rust,no_run
//! use ratelimiter_client::middleware::RemoteRateLimitLayer;
//! use ratelimiter_client::RateLimiterClient;
//! use tower::ServiceBuilder;
//!
//! # fn wire() -> Result<(), ratelimiter_client::ClientError> {
//! let client = RateLimiterClient::new("http://localhost:8080")?;
//! let layer = RemoteRateLimitLayer::new(client, "api", "99/s");
//! let _svc = ServiceBuilder::new().layer(layer).service(tower::service_fn(
//!     |_req: http::Request<()>| async { Ok::<_, std::convert::Infallible>("ok") },
//! ));
//! # Ok(())
//! # }
//! ```

use crate::client::RateLimiterClient;
use crate::snapshot::{RequestSnapshot, SessionId};
use crate::transport::Transport;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Error returned by [`RemoteRateLimitService`].
#[derive(Debug, thiserror::Error)]
pub enum LimitError<E> {
    /// No permit was granted for the rule.
    #[error("rate limit exceeded for '{rate_id}'")]
    Limited { rate_id: String },
    /// The wrapped service failed.
    #[error(transparent)]
    Inner(E),
}

impl<E> LimitError<E> {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited { .. })
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Limited { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    parent_id: Option<String>,
    id: String,
    rate: String,
    condition: Option<String>,
}

/// Layer applying [`RateLimiterClient::check_limit_in`] to every request.
///
/// The rule is registered on the first request and one permit is acquired per request. Service
/// failures are resolved by the client's failure policy. Requests arriving without a
/// [`SessionId`] extension get a fresh one, visible to the wrapped service.
pub struct RemoteRateLimitLayer<T> {
    client: RateLimiterClient<T>,
    rule: Arc<Rule>,
}

impl<T> Clone for RemoteRateLimitLayer<T> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone(), rule: self.rule.clone() }
    }
}

impl<T> std::fmt::Debug for RemoteRateLimitLayer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRateLimitLayer").field("rule", &self.rule).finish()
    }
}

impl<T> RemoteRateLimitLayer<T> {
    pub fn new(client: RateLimiterClient<T>, id: impl Into<String>, rate: impl Into<String>) -> Self {
        Self {
            client,
            rule: Arc::new(Rule { parent_id: None, id: id.into(), rate: rate.into(), condition: None }),
        }
    }

    /// Register the rule under `parent_id`.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.rule).parent_id = Some(parent_id.into());
        self
    }

    /// Register the rule with a condition expression.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.rule).condition = Some(condition.into());
        self
    }
}

impl<S, T> Layer<S> for RemoteRateLimitLayer<T> {
    type Service = RemoteRateLimitService<S, T>;

    fn layer(&self, service: S) -> Self::Service {
        RemoteRateLimitService { inner: service, client: self.client.clone(), rule: self.rule.clone() }
    }
}

/// Middleware service produced by [`RemoteRateLimitLayer`].
pub struct RemoteRateLimitService<S, T> {
    inner: S,
    client: RateLimiterClient<T>,
    rule: Arc<Rule>,
}

impl<S: Clone, T> Clone for RemoteRateLimitService<S, T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), client: self.client.clone(), rule: self.rule.clone() }
    }
}

impl<S: std::fmt::Debug, T> std::fmt::Debug for RemoteRateLimitService<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteRateLimitService")
            .field("inner", &self.inner)
            .field("rule", &self.rule)
            .finish()
    }
}

impl<S, T, B> Service<http::Request<B>> for RemoteRateLimitService<S, T>
where
    S: Service<http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    T: Transport + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = LimitError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(LimitError::Inner)
    }

    fn call(&mut self, mut req: http::Request<B>) -> Self::Future {
        let client = self.client.clone();
        let rule = self.rule.clone();
        // Take the service that was driven ready; leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        if req.extensions().get::<SessionId>().is_none() {
            req.extensions_mut().insert(SessionId(uuid::Uuid::new_v4().to_string()));
        }
        // The request moves into the inner service; capture it first.
        let snapshot = RequestSnapshot::capture(&req);

        Box::pin(async move {
            let granted = client
                .check_limit_with_snapshot(
                    Some(snapshot),
                    rule.parent_id.as_deref(),
                    &rule.id,
                    &rule.rate,
                    rule.condition.as_deref(),
                )
                .await;
            if !granted {
                return Err(LimitError::Limited { rate_id: rule.id.clone() });
            }
            inner.call(req).await.map_err(LimitError::Inner)
        })
    }
}
