//! Request snapshots sent to the service for conditional-rate evaluation.
//!
//! The client never depends on a concrete request type. Anything that can answer the pull-style
//! questions of [`RequestSource`] can be captured into an immutable [`RequestSnapshot`]:
//! - [`StaticRequest`]: an in-memory request, handy in tests and for non-HTTP callers.
//! - `http::Request<B>`: session, principal and peer address come from request extensions
//!   ([`SessionId`], [`Principal`], [`ClientAddr`]).
//!
//! A snapshot is built once per acquisition call, serialized as the request body, and dropped
//! when the call returns.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

mod http_request;
mod memory;

pub use http_request::{ClientAddr, Principal, SessionId};
pub use memory::StaticRequest;

/// Pull-based view of an inbound request.
///
/// Collections are returned in the order the request exposes them. Implementations must not
/// perform network I/O.
pub trait RequestSource {
    fn method(&self) -> Option<String>;

    fn header_names(&self) -> Vec<String>;

    /// All values of a header, in the order received.
    fn header_values(&self, name: &str) -> Vec<String>;

    fn attribute_names(&self) -> Vec<String> {
        Vec::new()
    }

    fn attribute(&self, _name: &str) -> Option<String> {
        None
    }

    /// Cookies as `(name, value)` pairs.
    fn cookies(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Preferred locales, most preferred first.
    fn locales(&self) -> Vec<String> {
        Vec::new()
    }

    fn parameter_names(&self) -> Vec<String>;

    fn parameter_values(&self, name: &str) -> Vec<String>;

    fn auth_type(&self) -> Option<String> {
        None
    }

    fn character_encoding(&self) -> Option<String> {
        None
    }

    fn context_path(&self) -> Option<String> {
        None
    }

    fn remote_addr(&self) -> Option<String> {
        None
    }

    fn request_uri(&self) -> Option<String> {
        None
    }

    fn servlet_path(&self) -> Option<String> {
        None
    }

    /// Session id, creating a session first when the request has none.
    ///
    /// Conditions evaluated by the service may depend on session-scoped state, so capturing a
    /// snapshot always asks for a session.
    fn session_id(&self) -> Option<String>;

    /// Name of the authenticated principal.
    fn user_principal(&self) -> Option<String> {
        None
    }
}

/// Immutable, serializable capture of a request.
///
/// Sections the source had no entries for are left out entirely rather than sent as empty
/// collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    headers: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<BTreeMap<String, Option<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    character_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cookies: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locales: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parameters: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    servlet_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_principal: Option<String>,
    /// Roles cannot be obtained from a request source; always absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_roles: Option<Vec<String>>,
}

impl RequestSnapshot {
    /// Capture an optional request; an absent request yields no snapshot.
    pub fn of(request: Option<&dyn RequestSource>) -> Option<Self> {
        request.map(Self::capture)
    }

    /// Capture every section of `request`.
    pub fn capture<R: RequestSource + ?Sized>(request: &R) -> Self {
        let session_id = request.session_id();

        let headers = non_empty(request.header_names()).map(|names| {
            names
                .into_iter()
                .map(|name| {
                    let values = request.header_values(&name);
                    (name, values)
                })
                .collect()
        });

        let attributes = non_empty(request.attribute_names()).map(|names| {
            names
                .into_iter()
                .map(|name| {
                    let value = request.attribute(&name);
                    (name, value)
                })
                .collect()
        });

        let cookies = non_empty(request.cookies()).map(|pairs| pairs.into_iter().collect());

        let locales = non_empty(request.locales());

        let parameters = non_empty(request.parameter_names()).map(|names| {
            names
                .into_iter()
                .map(|name| {
                    let values = request.parameter_values(&name);
                    (name, values)
                })
                .collect()
        });

        Self {
            method: request.method(),
            headers,
            attributes,
            auth_type: request.auth_type(),
            character_encoding: request.character_encoding(),
            context_path: request.context_path(),
            cookies,
            locales,
            parameters,
            remote_addr: request.remote_addr(),
            request_uri: request.request_uri(),
            servlet_path: request.servlet_path(),
            session_id,
            user_principal: request.user_principal(),
            user_roles: None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    pub fn headers(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.headers.as_ref()
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    pub fn attributes(&self) -> Option<&BTreeMap<String, Option<String>>> {
        self.attributes.as_ref()
    }

    pub fn auth_type(&self) -> Option<&str> {
        self.auth_type.as_deref()
    }

    pub fn character_encoding(&self) -> Option<&str> {
        self.character_encoding.as_deref()
    }

    pub fn context_path(&self) -> Option<&str> {
        self.context_path.as_deref()
    }

    pub fn cookies(&self) -> Option<&BTreeMap<String, String>> {
        self.cookies.as_ref()
    }

    pub fn locales(&self) -> Option<&[String]> {
        self.locales.as_deref()
    }

    pub fn parameters(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        self.parameters.as_ref()
    }

    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    pub fn request_uri(&self) -> Option<&str> {
        self.request_uri.as_deref()
    }

    pub fn servlet_path(&self) -> Option<&str> {
        self.servlet_path.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn user_principal(&self) -> Option<&str> {
        self.user_principal.as_deref()
    }

    pub fn user_roles(&self) -> Option<&[String]> {
        self.user_roles.as_deref()
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_request_yields_no_snapshot() {
        assert_eq!(RequestSnapshot::of(None), None);
    }

    #[test]
    fn captures_every_section() {
        let request = StaticRequest::new("POST", "/basket/checkout")
            .header("Accept", "application/json")
            .header("Accept", "text/plain")
            .cookie("theme", "dark")
            .param("item", "1")
            .param("item", "2")
            .attribute("tenant", "acme")
            .locale("en-GB")
            .remote_addr("10.0.0.7")
            .context_path("/shop")
            .servlet_path("/checkout")
            .principal("alice")
            .auth_type("BASIC")
            .character_encoding("UTF-8")
            .session("s-1");

        let snapshot = RequestSnapshot::capture(&request);
        assert_eq!(snapshot.method(), Some("POST"));
        assert_eq!(
            snapshot.headers().unwrap()["Accept"],
            vec!["application/json".to_string(), "text/plain".to_string()]
        );
        assert_eq!(snapshot.header("accept"), Some("application/json"));
        assert_eq!(snapshot.cookies().unwrap()["theme"], "dark");
        assert_eq!(snapshot.parameters().unwrap()["item"], vec!["1".to_string(), "2".to_string()]);
        assert_eq!(snapshot.attributes().unwrap()["tenant"], Some("acme".to_string()));
        assert_eq!(snapshot.locales(), Some(&["en-GB".to_string()][..]));
        assert_eq!(snapshot.remote_addr(), Some("10.0.0.7"));
        assert_eq!(snapshot.request_uri(), Some("/basket/checkout"));
        assert_eq!(snapshot.context_path(), Some("/shop"));
        assert_eq!(snapshot.servlet_path(), Some("/checkout"));
        assert_eq!(snapshot.session_id(), Some("s-1"));
        assert_eq!(snapshot.user_principal(), Some("alice"));
        assert_eq!(snapshot.auth_type(), Some("BASIC"));
        assert_eq!(snapshot.character_encoding(), Some("UTF-8"));
        assert_eq!(snapshot.user_roles(), None);
    }

    #[test]
    fn empty_sections_are_absent_not_empty() {
        let request = StaticRequest::new("GET", "/");
        let snapshot = RequestSnapshot::capture(&request);
        assert!(snapshot.headers().is_none());
        assert!(snapshot.cookies().is_none());
        assert!(snapshot.parameters().is_none());
        assert!(snapshot.locales().is_none());
        assert!(snapshot.attributes().is_none());

        let json = serde_json::to_value(&snapshot).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("headers"));
        assert!(!object.contains_key("cookies"));
        assert_eq!(object["method"], "GET");
        assert_eq!(object["requestUri"], "/");
    }

    #[test]
    fn capture_creates_a_session_when_missing() {
        let request = StaticRequest::new("GET", "/");
        assert!(!request.has_session());
        let snapshot = RequestSnapshot::capture(&request);
        assert!(request.has_session());
        let created = snapshot.session_id().expect("session id").to_string();
        // Same session on the next capture.
        let again = RequestSnapshot::capture(&request);
        assert_eq!(again.session_id(), Some(created.as_str()));
    }

    #[test]
    fn serializes_camel_case_fields() {
        let request = StaticRequest::new("GET", "/a").remote_addr("127.0.0.1").session("abc");
        let json = serde_json::to_value(RequestSnapshot::capture(&request)).unwrap();
        assert_eq!(json["remoteAddr"], "127.0.0.1");
        assert_eq!(json["sessionId"], "abc");
        assert!(json.get("userRoles").is_none());
    }
}
