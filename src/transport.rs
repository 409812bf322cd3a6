//! Wire transport abstraction.
//!
//! The client speaks to the service through a [`Transport`]: it hands over a fully formed
//! [`HttpRequest`] (method, absolute URL, JSON body) and receives the raw [`HttpResponse`].
//! Status interpretation stays in the client, so a transport only reports a
//! [`TransportError`] when no response was obtained at all.
//!
//! - `HttpTransport` (feature `http-client`, on by default) sends requests with `reqwest`.
//! - Tests substitute an in-memory transport.

use crate::error::TransportError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use url::Url;

#[cfg(feature = "http-client")]
pub mod http_client;

#[cfg(feature = "http-client")]
pub use http_client::HttpTransport;

/// Content type sent with every request, including those with an empty body.
pub const APPLICATION_JSON: &str = "application/json";

/// HTTP verbs used by the service API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request handed to a transport. The body is always JSON; an absent payload is sent as a
/// zero-length body rather than omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, body: Vec<u8>) -> Self {
        Self { method, url, body }
    }

    /// First value of a query parameter.
    pub fn query(&self, name: &str) -> Option<String> {
        self.url.query_pairs().find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
    }
}

/// Raw response returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Reason phrase (e.g. `"Internal Server Error"`).
    pub reason: String,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, reason: impl Into<String>, body: impl Into<String>) -> Self {
        Self { status, reason: reason.into(), body: body.into() }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, "OK", body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs one HTTP round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).send(request).await
    }
}
