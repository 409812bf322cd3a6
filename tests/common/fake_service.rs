//! In-memory stand-in for the rate-limiter service.
//!
//! Stores rules, registers trees, counts permits in fixed windows per rule, and records every
//! request. Faults and delays can be scripted per test.

use async_trait::async_trait;
use ratelimiter_client::{
    ClientBuilder, ClientConfig, HttpRequest, HttpResponse, Method, RateExpr, RateLimiterClient,
    RateRule, Transport, TransportError,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const BASE_URL: &str = "http://ratelimiter.test/";

#[derive(Debug)]
enum Scripted {
    Status(u16, String),
    Unreachable,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u64,
}

#[derive(Debug, Default)]
struct State {
    rules: HashMap<String, RateRule>,
    windows: HashMap<String, Window>,
    scripted: VecDeque<Scripted>,
    outage: Option<u16>,
    delay: Option<Duration>,
    requests: Vec<HttpRequest>,
}

#[derive(Debug, Default)]
pub struct FakeService {
    state: Mutex<State>,
}

impl FakeService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Client pointed at this service with default cache and policy.
    pub fn client(self: &Arc<Self>) -> RateLimiterClient<Arc<FakeService>> {
        self.builder().build_with(self.clone())
    }

    pub fn builder(&self) -> ClientBuilder {
        ClientBuilder::new(config())
    }

    /// Answer the next request with `status` and `body`.
    pub fn fail_next(&self, status: u16, body: &str) {
        self.lock().scripted.push_back(Scripted::Status(status, body.to_string()));
    }

    /// Fail the next request before any response is produced.
    pub fn drop_next(&self) {
        self.lock().scripted.push_back(Scripted::Unreachable);
    }

    /// Answer every request with `status` until cleared.
    pub fn outage(&self, status: Option<u16>) {
        self.lock().outage = status;
    }

    /// Sleep before answering each request.
    pub fn delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.lock().requests.clone()
    }

    /// Number of recorded requests with this method and path.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.url.path() == path)
            .count()
    }

    pub fn registrations(&self) -> usize {
        self.count(Method::Post, "/rates") + self.count(Method::Post, "/rates/tree")
    }

    pub fn has_rule(&self, id: &str) -> bool {
        self.lock().rules.contains_key(id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let segments: Vec<String> = request
            .url
            .path_segments()
            .map(|s| s.map(decode_segment).collect())
            .unwrap_or_default();
        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
        match (request.method, segments.as_slice()) {
            (Method::Post, ["rates"]) => self.post_rule(&request.body),
            (Method::Post, ["rates", "tree"]) => self.post_tree(&request.body),
            (Method::Get, ["rates", id]) => match self.lock().rules.get(*id) {
                Some(rule) => json(rule),
                None => status(404, ""),
            },
            (Method::Delete, ["rates", id]) => {
                let mut state = self.lock();
                state.rules.remove(*id);
                state.windows.remove(*id);
                status(200, "")
            }
            (Method::Patch, ["permits", "available"]) => self.permits(request, 1, false),
            (Method::Patch, ["permits", "acquire"]) => {
                let permits = request.query("permits").and_then(|p| p.parse().ok()).unwrap_or(1);
                self.permits(request, permits, true)
            }
            _ => status(404, ""),
        }
    }

    fn post_rule(&self, body: &[u8]) -> HttpResponse {
        match serde_json::from_slice::<RateRule>(body) {
            Ok(rule) => {
                self.lock().rules.insert(rule.id.clone(), rule.clone());
                json(&rule)
            }
            Err(e) => status(400, &e.to_string()),
        }
    }

    fn post_tree(&self, body: &[u8]) -> HttpResponse {
        let tree: Value = match serde_json::from_slice(body) {
            Ok(tree) => tree,
            Err(e) => return status(400, &e.to_string()),
        };
        let mut rules = Vec::new();
        let root_id = tree.get("id").and_then(Value::as_str).unwrap_or("root").to_string();
        if let Err(message) = flatten(&tree, root_id, None, &mut rules) {
            return status(400, &message);
        }
        let mut state = self.lock();
        for rule in &rules {
            state.rules.insert(rule.id.clone(), rule.clone());
        }
        json(&rules)
    }

    fn permits(&self, request: &HttpRequest, permits: u64, consume: bool) -> HttpResponse {
        let Some(id) = request.query("rateId") else {
            return status(400, "rateId is required");
        };
        let mut state = self.lock();
        let Some((limit, period)) = state.rules.get(&id).and_then(quota) else {
            return status(404, &format!("no rate registered for {}", id));
        };
        let now = Instant::now();
        let window = state.windows.entry(id).or_insert(Window { started: now, used: 0 });
        if now.duration_since(window.started) >= period {
            *window = Window { started: now, used: 0 };
        }
        let available = window.used + permits <= limit;
        if available && consume {
            window.used += permits;
        }
        text(available)
    }
}

/// Quota of the first limit in a rule.
fn quota(rule: &RateRule) -> Option<(u64, Duration)> {
    let limit = rule.rates.first()?;
    match limit.rate_expression() {
        Some(expr) => {
            let expr: RateExpr = expr.parse().ok()?;
            Some((expr.permits(), expr.period()))
        }
        None => Some((limit.permits, limit.duration)),
    }
}

fn flatten(
    node: &Value,
    id: String,
    parent_id: Option<String>,
    out: &mut Vec<RateRule>,
) -> Result<(), String> {
    let object = node.as_object().ok_or_else(|| format!("rule '{}' is not an object", id))?;
    let rates = object.get("rates").cloned().unwrap_or_else(|| Value::Array(Vec::new()));
    let mut rule = serde_json::json!({ "id": &id, "rates": rates });
    for key in ["operator", "when"] {
        if let Some(value) = object.get(key) {
            rule[key] = value.clone();
        }
    }
    if let Some(parent_id) = &parent_id {
        rule["parentId"] = Value::String(parent_id.clone());
    }
    let rule: RateRule = serde_json::from_value(rule).map_err(|e| e.to_string())?;
    out.push(rule);
    for (key, child) in object {
        if child.is_object() {
            flatten(child, key.clone(), Some(id.clone()), out)?;
        }
    }
    Ok(())
}

fn decode_segment(segment: &str) -> String {
    url::form_urlencoded::parse(format!("s={}", segment.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

fn status(code: u16, body: &str) -> HttpResponse {
    let reason = http::StatusCode::from_u16(code)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or_default();
    HttpResponse::new(code, reason, body)
}

fn json<T: serde::Serialize + ?Sized>(value: &T) -> HttpResponse {
    match serde_json::to_string(value) {
        Ok(body) => HttpResponse::ok(body),
        Err(e) => status(500, &e.to_string()),
    }
}

fn text(value: bool) -> HttpResponse {
    HttpResponse::ok(if value { "true" } else { "false" })
}

pub fn config() -> ClientConfig {
    ClientConfig::builder(BASE_URL).build().expect("valid base url")
}

#[async_trait]
impl Transport for FakeService {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let (delay, scripted, outage) = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            (state.delay, state.scripted.pop_front(), state.outage)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match scripted {
            Some(Scripted::Status(code, body)) => return Ok(status(code, &body)),
            Some(Scripted::Unreachable) => return Err(TransportError::new("connection refused")),
            None => {}
        }
        if let Some(code) = outage {
            return Ok(status(code, "service unavailable"));
        }
        Ok(self.handle(&request))
    }
}
