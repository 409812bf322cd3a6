//! Rate-limiter service client.
//!
//! Two families of entry points:
//!
//! - **Convenience** ([`check_limit`](RateLimiterClient::check_limit),
//!   [`try_to_acquire_permit_quietly`](RateLimiterClient::try_to_acquire_permit_quietly)):
//!   register the rule on first use, then acquire one permit. They return a plain `bool` and
//!   route every failure through the injected [`FailurePolicy`] ([`FailOpen`] by default), so
//!   they are safe to call from a request-handling path.
//! - **Strict** ([`is_permit_available`](RateLimiterClient::is_permit_available),
//!   [`try_to_acquire_permits`](RateLimiterClient::try_to_acquire_permits) and the
//!   registration/query calls): exactly one round trip, errors returned unchanged. The
//!   `*_within` variants bound the wait with a caller-supplied timeout.
//!
//! Semantics:
//! - Rules are validated locally before anything is sent.
//! - Every successful registration adds the returned id to the [`RegistrationCache`].
//! - `delete_rates` leaves the id cached, so a later `check_limit` for that id skips
//!   registration.
//! - With `async = true` the service answers from current availability and deducts permits
//!   out-of-band; `true` means "available at decision time", not "durably consumed".
//!
//! ```rust,no_run
//! use ratelimiter_client::RateLimiterClient;
//!
//! # async fn run() -> Result<(), ratelimiter_client::ClientError> {
//! let client = RateLimiterClient::new("http://localhost:8080")?;
//! if !client.check_limit(None, "login", "5/m").await {
//!     // reject with 429
//! }
//! # Ok(())
//! # }
//! ```

use crate::cache::{InMemoryRegistrationCache, RegistrationCache};
use crate::config::ClientConfig;
use crate::error::{ClientError, ServerFault, TransportError};
use crate::model::{RateLimit, RateRule, RateTree};
use crate::policy::{FailOpen, FailurePolicy};
use crate::snapshot::{RequestSnapshot, RequestSource};
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

#[cfg(feature = "http-client")]
use crate::transport::HttpTransport;

const TARGET: &str = "ratelimiter_client::client";

const ACTION_POST_RATE: &str = "Post rate";
const ACTION_ACQUIRE_PERMIT: &str = "Acquire permit";

/// Client for the remote rate-limiter service.
///
/// Cheap to clone; clones share the transport, registration cache, and failure policy.
pub struct RateLimiterClient<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    config: ClientConfig,
    transport: T,
    cache: Arc<dyn RegistrationCache>,
    policy: Arc<dyn FailurePolicy>,
}

impl<T> Clone for RateLimiterClient<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> std::fmt::Debug for RateLimiterClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiterClient")
            .field("base_url", &self.inner.config.base_url().as_str())
            .field("cache", &self.inner.cache)
            .field("policy", &self.inner.policy)
            .field("transport", &"<transport>")
            .finish()
    }
}

/// Builder for [`RateLimiterClient`].
pub struct ClientBuilder {
    config: ClientConfig,
    cache: Arc<dyn RegistrationCache>,
    policy: Arc<dyn FailurePolicy>,
}

impl ClientBuilder {
    /// Builder with an empty in-memory cache and the fail-open policy.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            cache: Arc::new(InMemoryRegistrationCache::new()),
            policy: Arc::new(FailOpen),
        }
    }

    /// Use `cache` to track registered ids (pre-seeded, shared, or custom).
    pub fn registration_cache(mut self, cache: Arc<dyn RegistrationCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Policy consulted by the convenience entry points when a call fails.
    pub fn failure_policy<P>(mut self, policy: P) -> Self
    where
        P: FailurePolicy + 'static,
    {
        self.policy = Arc::new(policy);
        self
    }

    /// Build a client over a custom transport.
    pub fn build_with<T: Transport>(self, transport: T) -> RateLimiterClient<T> {
        RateLimiterClient {
            inner: Arc::new(Inner {
                config: self.config,
                transport,
                cache: self.cache,
                policy: self.policy,
            }),
        }
    }

    /// Build a client over HTTP.
    #[cfg(feature = "http-client")]
    pub fn build(self) -> Result<RateLimiterClient<HttpTransport>, ClientError> {
        let transport = HttpTransport::new(&self.config)?;
        Ok(self.build_with(transport))
    }
}

#[cfg(feature = "http-client")]
impl RateLimiterClient<HttpTransport> {
    /// Builder for an HTTP client; see [`ClientBuilder::build_with`] for other transports.
    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    /// HTTP client with default timeouts, an empty cache, and the fail-open policy.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        ClientBuilder::new(ClientConfig::builder(base_url).build()?).build()
    }

    /// Copy of this client with both connect and read timeouts replaced.
    ///
    /// The copy shares this client's registration cache and failure policy.
    pub fn with_timeout(&self, timeout: Duration) -> Result<Self, ClientError> {
        let config = self.inner.config.with_timeout(timeout)?;
        let transport = HttpTransport::new(&config)?;
        Ok(ClientBuilder {
            config,
            cache: self.inner.cache.clone(),
            policy: self.inner.policy.clone(),
        }
        .build_with(transport))
    }
}

impl<T> RateLimiterClient<T> {
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn registration_cache(&self) -> &Arc<dyn RegistrationCache> {
        &self.inner.cache
    }

    pub fn failure_policy(&self) -> &Arc<dyn FailurePolicy> {
        &self.inner.policy
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T> RateLimiterClient<T>
where
    T: Transport + 'static,
{

    /// Register `id` with `rate` on first use, then try to acquire one permit for `request`.
    ///
    /// Never fails: errors go through the failure policy, whose answer is returned.
    pub fn check_limit<'a>(
        &'a self,
        request: Option<&dyn RequestSource>,
        id: &'a str,
        rate: &'a str,
    ) -> impl Future<Output = bool> + Send + 'a {
        self.check_limit_in(request, None, id, rate, None)
    }

    /// As [`check_limit`](Self::check_limit), registering the rule with a condition.
    pub fn check_limit_when<'a>(
        &'a self,
        request: Option<&dyn RequestSource>,
        id: &'a str,
        rate: &'a str,
        condition: &'a str,
    ) -> impl Future<Output = bool> + Send + 'a {
        self.check_limit_in(request, None, id, rate, Some(condition))
    }

    /// As [`check_limit`](Self::check_limit), registering the rule under `parent_id`.
    ///
    /// The request is captured into a snapshot before this returns; the future does not
    /// borrow it.
    pub fn check_limit_in<'a>(
        &'a self,
        request: Option<&dyn RequestSource>,
        parent_id: Option<&'a str>,
        id: &'a str,
        rate: &'a str,
        condition: Option<&'a str>,
    ) -> impl Future<Output = bool> + Send + 'a {
        let snapshot = RequestSnapshot::of(request);
        self.check_limit_with_snapshot(snapshot, parent_id, id, rate, condition)
    }

    /// [`check_limit_in`](Self::check_limit_in) for an already captured request.
    pub async fn check_limit_with_snapshot(
        &self,
        snapshot: Option<RequestSnapshot>,
        parent_id: Option<&str>,
        id: &str,
        rate: &str,
        condition: Option<&str>,
    ) -> bool {
        if self.inner.cache.contains(id) {
            debug!(target: TARGET, rate_id = %id, "rate already registered; skipping registration");
        } else if let Err(error) = self.post_rate_expr(parent_id, id, rate, condition).await {
            return self.inner.policy.on_error(ACTION_POST_RATE, &error, id, snapshot.as_ref());
        }
        self.acquire_quietly(id, snapshot).await
    }

    /// Try to acquire one permit; failures go through the failure policy.
    pub fn try_to_acquire_permit_quietly<'a>(
        &'a self,
        id: &'a str,
        request: Option<&dyn RequestSource>,
    ) -> impl Future<Output = bool> + Send + 'a {
        let snapshot = RequestSnapshot::of(request);
        self.acquire_quietly(id, snapshot)
    }

    async fn acquire_quietly(&self, id: &str, snapshot: Option<RequestSnapshot>) -> bool {
        match self.try_to_acquire_permits(id, 1, false, snapshot.as_ref()).await {
            Ok(acquired) => acquired,
            Err(error) => {
                self.inner.policy.on_error(ACTION_ACQUIRE_PERMIT, &error, id, snapshot.as_ref())
            }
        }
    }

    /// Whether a permit is currently available for `id`, without consuming it.
    pub async fn is_permit_available(
        &self,
        id: &str,
        snapshot: Option<&RequestSnapshot>,
    ) -> Result<bool, ClientError> {
        let url = self.endpoint(&["permits", "available"], &[("rateId", id)])?;
        let body = encode(snapshot)?;
        let text = self.send_for_text(Method::Patch, url, body).await?;
        Ok(parse_bool(&text))
    }

    /// [`is_permit_available`](Self::is_permit_available) for a live request.
    pub fn is_permit_available_for<'a>(
        &'a self,
        id: &'a str,
        request: Option<&dyn RequestSource>,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send + 'a {
        let snapshot = RequestSnapshot::of(request);
        async move { self.is_permit_available(id, snapshot.as_ref()).await }
    }

    /// [`is_permit_available`](Self::is_permit_available) bounded by `timeout`.
    ///
    /// The round trip runs on a spawned task; when `timeout` elapses the wait is abandoned with
    /// [`ClientError::Timeout`] while the request itself may still complete.
    pub async fn is_permit_available_within(
        &self,
        id: &str,
        snapshot: Option<RequestSnapshot>,
        timeout: Duration,
    ) -> Result<bool, ClientError> {
        let client = self.clone();
        let id = id.to_string();
        let handle =
            tokio::spawn(async move { client.is_permit_available(&id, snapshot.as_ref()).await });
        await_bounded(handle, timeout).await
    }

    /// Acquire a single permit for `id`, synchronously, without request data.
    pub async fn try_to_acquire_permit(&self, id: &str) -> Result<bool, ClientError> {
        self.try_to_acquire_permits(id, 1, false, None).await
    }

    /// Try to acquire `permits` permits for `id`.
    ///
    /// With `asynchronous = true` the service reports availability immediately and deducts the
    /// permits out-of-band.
    pub async fn try_to_acquire_permits(
        &self,
        id: &str,
        permits: u32,
        asynchronous: bool,
        snapshot: Option<&RequestSnapshot>,
    ) -> Result<bool, ClientError> {
        let permits = permits.to_string();
        let url = self.endpoint(
            &["permits", "acquire"],
            &[("rateId", id), ("permits", permits.as_str()), ("async", bool_str(asynchronous))],
        )?;
        let body = encode(snapshot)?;
        let text = self.send_for_text(Method::Patch, url, body).await?;
        Ok(parse_bool(&text))
    }

    /// [`try_to_acquire_permits`](Self::try_to_acquire_permits) for a live request.
    pub fn try_to_acquire_permits_for<'a>(
        &'a self,
        id: &'a str,
        permits: u32,
        asynchronous: bool,
        request: Option<&dyn RequestSource>,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send + 'a {
        let snapshot = RequestSnapshot::of(request);
        async move { self.try_to_acquire_permits(id, permits, asynchronous, snapshot.as_ref()).await }
    }

    /// [`try_to_acquire_permits`](Self::try_to_acquire_permits) bounded by `timeout`.
    ///
    /// The round trip runs on a spawned task; when `timeout` elapses the wait is abandoned with
    /// [`ClientError::Timeout`] while the request itself may still complete.
    pub async fn try_to_acquire_permits_within(
        &self,
        id: &str,
        permits: u32,
        asynchronous: bool,
        snapshot: Option<RequestSnapshot>,
        timeout: Duration,
    ) -> Result<bool, ClientError> {
        let client = self.clone();
        let id = id.to_string();
        let handle = tokio::spawn(async move {
            client.try_to_acquire_permits(&id, permits, asynchronous, snapshot.as_ref()).await
        });
        await_bounded(handle, timeout).await
    }

    /// Fetch the current definition of rule `id`.
    pub async fn get_rates(&self, id: &str) -> Result<RateRule, ClientError> {
        let url = self.endpoint(&["rates", id], &[])?;
        let text = self.send_for_text(Method::Get, url, Vec::new()).await?;
        decode(text)
    }

    /// Register one rule and cache its id.
    pub async fn post_rate(&self, rule: &RateRule) -> Result<RateRule, ClientError> {
        rule.validate()?;
        let url = self.endpoint(&["rates"], &[])?;
        let body = encode(Some(rule))?;
        let text = self.send_for_text(Method::Post, url, body).await?;
        let posted: RateRule = decode(text)?;
        let id = if posted.id.is_empty() { &rule.id } else { &posted.id };
        self.inner.cache.mark_registered(id);
        Ok(posted)
    }

    /// Register a single-limit rule built from a rate expression.
    pub async fn post_rate_expr(
        &self,
        parent_id: Option<&str>,
        id: &str,
        rate: &str,
        condition: Option<&str>,
    ) -> Result<RateRule, ClientError> {
        let mut limit = RateLimit::of(rate);
        if let Some(condition) = condition {
            limit = limit.when(condition);
        }
        let mut rule = RateRule::new(id, vec![limit]);
        if let Some(parent_id) = parent_id {
            rule = rule.with_parent(parent_id);
        }
        self.post_rate(&rule).await
    }

    /// Register rules one at a time, in order.
    ///
    /// Every rule is validated before the first request. A service failure stops the batch at
    /// that rule; rules already registered stay registered.
    pub async fn post_rates(&self, rules: &[RateRule]) -> Result<Vec<RateRule>, ClientError> {
        rules.iter().try_for_each(RateRule::validate)?;
        let mut posted = Vec::with_capacity(rules.len());
        for rule in rules {
            posted.push(self.post_rate(rule).await?);
        }
        Ok(posted)
    }

    /// Register `id -> rate expression` pairs, e.g. `[("login", "5/m"), ("home", "99/s")]`.
    pub async fn post_rate_map<I, K, V>(&self, mappings: I) -> Result<Vec<RateRule>, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let rules: Vec<RateRule> =
            mappings.into_iter().map(|(id, rate)| RateRule::of(id, rate)).collect();
        self.post_rates(&rules).await
    }

    /// Register a hierarchy of rules in one request and cache every returned id.
    ///
    /// Every node is validated before anything is sent. Results come back in the order the
    /// service registered them.
    pub async fn post_rate_tree(&self, tree: &RateTree) -> Result<Vec<RateRule>, ClientError> {
        tree.validate()?;
        let url = self.endpoint(&["rates", "tree"], &[])?;
        let body = encode(Some(tree))?;
        let text = self.send_for_text(Method::Post, url, body).await?;
        let posted: Vec<RateRule> = decode(text)?;
        for rule in &posted {
            self.inner.cache.mark_registered(&rule.id);
        }
        Ok(posted)
    }

    /// Delete rule `id` on the service.
    ///
    /// The id stays in the registration cache: a later `check_limit` for the same id will not
    /// re-register it.
    pub async fn delete_rates(&self, id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["rates", id], &[])?;
        let response = self.round_trip(Method::Delete, url, Vec::new()).await?;
        if !response.is_success() {
            return Err(fault(response));
        }
        Ok(())
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, ClientError> {
        let mut url = self.inner.config.base_url().clone();
        let base = url.to_string();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(base))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn round_trip(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
    ) -> Result<HttpResponse, ClientError> {
        let started = Instant::now();
        debug!(target: TARGET, method = %method, url = %url, bytes = body.len(), "sending request");
        let response = self.inner.transport.send(HttpRequest::new(method, url, body)).await?;
        debug!(
            target: TARGET,
            method = %method,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received response"
        );
        Ok(response)
    }

    async fn send_for_text(
        &self,
        method: Method,
        url: Url,
        body: Vec<u8>,
    ) -> Result<String, ClientError> {
        let response = self.round_trip(method, url, body).await?;
        if !response.is_success() || response.body.is_empty() {
            return Err(fault(response));
        }
        Ok(response.body)
    }
}

async fn await_bounded(
    handle: JoinHandle<Result<bool, ClientError>>,
    timeout: Duration,
) -> Result<bool, ClientError> {
    let started = Instant::now();
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => {
            Err(TransportError::new("request task did not complete").with_source(join_error).into())
        }
        Err(_) => Err(ClientError::Timeout { elapsed: started.elapsed(), timeout }),
    }
}

fn fault(response: HttpResponse) -> ClientError {
    let body = if response.body.is_empty() { None } else { Some(response.body) };
    ServerFault::new(response.status, response.reason, body).into()
}

fn encode<B: Serialize + ?Sized>(body: Option<&B>) -> Result<Vec<u8>, ClientError> {
    match body {
        Some(body) => serde_json::to_vec(body).map_err(ClientError::Encode),
        None => Ok(Vec::new()),
    }
}

fn decode<D: DeserializeOwned>(body: String) -> Result<D, ClientError> {
    match serde_json::from_str(&body) {
        Ok(value) => Ok(value),
        Err(source) => Err(ClientError::Decode { source, body }),
    }
}

/// `"true"` in any case (surrounding whitespace ignored) is true; anything else is false.
fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}
