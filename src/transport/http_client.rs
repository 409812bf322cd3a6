use super::{HttpRequest, HttpResponse, Method, Transport, APPLICATION_JSON};
use crate::config::ClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// Connect and read timeouts come from [`ClientConfig`]; exceeding either is reported as a
/// [`TransportError`] with `is_timeout() == true`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .user_agent(config.user_agent())
            .build()
            .map_err(|e| TransportError::new("failed to create http client").with_source(e))?;
        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client (shared pools, custom TLS, proxies).
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

fn map_error(err: reqwest::Error) -> TransportError {
    let message = err.to_string();
    if err.is_timeout() {
        TransportError::timed_out(message).with_source(err)
    } else {
        TransportError::new(message).with_source(err)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .request(to_reqwest(request.method), request.url)
            .header(CONTENT_TYPE, APPLICATION_JSON)
            .body(request.body)
            .send()
            .await
            .map_err(map_error)?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.text().await.map_err(map_error)?;
        Ok(HttpResponse { status: status.as_u16(), reason, body })
    }
}
