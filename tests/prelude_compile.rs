//! Compile-time prelude coverage test.
use ratelimiter_client::prelude::*;
use std::sync::Arc;

#[tokio::test]
async fn prelude_reexports_core_types() {
    let config = ClientConfig::builder("http://127.0.0.1:1").build().expect("valid config");
    let cache: Arc<dyn RegistrationCache> = Arc::new(InMemoryRegistrationCache::seeded(["a"]));
    let client = RateLimiterClient::builder(config)
        .registration_cache(cache)
        .failure_policy(FailClosed)
        .build()
        .expect("http client");

    let rule = RateRule::new("a", vec![RateLimit::of("1/s")]).with_operator(Operator::None);
    assert!(rule.validate().is_ok());
    let _layer: RemoteRateLimitLayer<HttpTransport> = RemoteRateLimitLayer::new(client.clone(), "a", "1/s");
    let _ = RequestSnapshot::capture(&StaticRequest::new("GET", "/"));
    let _: Option<&dyn FailurePolicy> = Some(&FailOpen);
    let _: fn(ServerFault) -> ClientError = ClientError::from;
    let _: fn(TransportError) -> ClientError = ClientError::from;
    let _: fn(ValidationError) -> ClientError = ClientError::from;
    let _: Option<LimitError<std::io::Error>> = None;
    let _: Option<&dyn RequestSource> = None;
    let _: Option<ClientBuilder> = None;
    assert!(client.registration_cache().contains("a"));
}
