mod common;

use common::fake_service::FakeService;
use ratelimiter_client::snapshot::SessionId;
use ratelimiter_client::{FailClosed, LimitError, Method, RemoteRateLimitLayer};
use std::convert::Infallible;
use tower::{service_fn, Layer, ServiceExt};

fn request(uri: &str) -> http::Request<()> {
    let mut request = http::Request::builder()
        .method("GET")
        .uri(uri)
        .header("Accept-Language", "en-GB,en;q=0.8")
        .body(())
        .unwrap();
    request.extensions_mut().insert(SessionId("abc".to_string()));
    request
}

async fn echo(req: http::Request<()>) -> Result<String, Infallible> {
    Ok(req.uri().path().to_string())
}

#[tokio::test]
async fn layer_passes_until_quota_is_spent() {
    let service = FakeService::new();
    let layer = RemoteRateLimitLayer::new(service.client(), "api", "2/m");
    let svc = layer.layer(service_fn(echo));

    assert_eq!(svc.clone().oneshot(request("/a")).await.unwrap(), "/a");
    assert_eq!(svc.clone().oneshot(request("/b")).await.unwrap(), "/b");
    let err = svc.clone().oneshot(request("/c")).await.unwrap_err();
    assert!(err.is_limited());
    assert!(matches!(err, LimitError::Limited { ref rate_id } if rate_id == "api"));
    assert_eq!(err.to_string(), "rate limit exceeded for 'api'");

    assert_eq!(service.registrations(), 1);
}

#[tokio::test]
async fn layer_sends_request_snapshot() {
    let service = FakeService::new();
    let svc = RemoteRateLimitLayer::new(service.client(), "api", "5/s").layer(service_fn(echo));

    svc.oneshot(request("/search?q=rust&page=2")).await.unwrap();

    let acquire = service.requests().pop().unwrap();
    assert_eq!(acquire.method, Method::Patch);
    let body: serde_json::Value = serde_json::from_slice(&acquire.body).unwrap();
    assert_eq!(body["method"], "GET");
    assert_eq!(body["requestUri"], "/search");
    assert_eq!(body["sessionId"], "abc");
    assert_eq!(body["parameters"]["q"][0], "rust");
    assert_eq!(body["locales"][0], "en-GB");
}

#[tokio::test]
async fn layer_registers_under_parent_with_condition() {
    let service = FakeService::new();
    let layer = RemoteRateLimitLayer::new(service.client(), "uploads", "5/s")
        .with_parent("web")
        .when("web.request.method=POST");
    layer.layer(service_fn(echo)).oneshot(request("/upload")).await.unwrap();

    let rule: serde_json::Value = serde_json::from_slice(&service.requests()[0].body).unwrap();
    assert_eq!(rule["id"], "uploads");
    assert_eq!(rule["parentId"], "web");
    assert_eq!(rule["rates"][0]["when"], "web.request.method=POST");
}

#[tokio::test]
async fn layer_follows_client_failure_policy() {
    let service = FakeService::new();
    service.outage(Some(503));

    let open = RemoteRateLimitLayer::new(service.client(), "api", "5/s").layer(service_fn(echo));
    assert!(open.oneshot(request("/x")).await.is_ok());

    let closed_client = service.builder().failure_policy(FailClosed).build_with(service.clone());
    let closed = RemoteRateLimitLayer::new(closed_client, "api", "5/s").layer(service_fn(echo));
    assert!(closed.oneshot(request("/x")).await.unwrap_err().is_limited());
}

#[tokio::test]
async fn layer_creates_session_for_requests_without_one() {
    let service = FakeService::new();
    let svc = RemoteRateLimitLayer::new(service.client(), "api", "5/s").layer(service_fn(
        |req: http::Request<()>| async move {
            Ok::<_, Infallible>(req.extensions().get::<SessionId>().map(|s| s.0.clone()))
        },
    ));

    let bare = http::Request::builder().uri("/a").body(()).unwrap();
    let seen = svc.oneshot(bare).await.unwrap().expect("session extension");

    let acquire = service.requests().pop().unwrap();
    let body: serde_json::Value = serde_json::from_slice(&acquire.body).unwrap();
    let sent = body["sessionId"].as_str().expect("sessionId in body");
    assert_eq!(sent.len(), 36);
    assert_eq!(sent, seen);
}
