//! [`RequestSource`] for `http::Request`.
//!
//! Headers, method, path and query come straight from the request. Cookies are parsed from
//! `Cookie` headers and locales from `Accept-Language` (highest quality first). Session,
//! principal and peer address are not part of an HTTP message; upstream layers provide them as
//! request extensions. [`RemoteRateLimitService`](crate::middleware::RemoteRateLimitService)
//! inserts a new [`SessionId`] into requests that arrive without one.

use super::RequestSource;
use http::header::{ACCEPT_LANGUAGE, AUTHORIZATION, CONTENT_TYPE, COOKIE};
use http::Request;
use std::net::SocketAddr;

/// Session id placed in request extensions by a session layer, or created by the rate-limit
/// middleware when missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

/// Authenticated principal placed in request extensions by an auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal(pub String);

/// Peer address placed in request extensions by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientAddr(pub SocketAddr);

impl<B> RequestSource for Request<B> {
    fn method(&self) -> Option<String> {
        Some(Request::method(self).as_str().to_string())
    }

    fn header_names(&self) -> Vec<String> {
        self.headers().keys().map(|name| name.as_str().to_string()).collect()
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        self.headers()
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect()
    }

    fn locales(&self) -> Vec<String> {
        let mut ranked: Vec<(String, f32)> = self
            .headers()
            .get_all(ACCEPT_LANGUAGE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|header| header.split(','))
            .filter_map(|entry| {
                let mut parts = entry.split(';');
                let tag = parts.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = parts
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0).then(|| (tag.to_string(), quality))
            })
            .collect();
        // Stable sort keeps header order among equal qualities.
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.into_iter().map(|(tag, _)| tag).collect()
    }

    fn parameter_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in query_pairs(self.uri()) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    fn parameter_values(&self, name: &str) -> Vec<String> {
        query_pairs(self.uri()).filter(|(n, _)| n == name).map(|(_, v)| v).collect()
    }

    fn auth_type(&self) -> Option<String> {
        let header = self.headers().get(AUTHORIZATION)?.to_str().ok()?;
        let scheme = header.split_whitespace().next()?;
        Some(scheme.to_ascii_uppercase())
    }

    fn character_encoding(&self) -> Option<String> {
        let content_type = self.headers().get(CONTENT_TYPE)?.to_str().ok()?;
        content_type
            .split(';')
            .filter_map(|p| p.trim().split_once('='))
            .find(|(k, _)| k.trim().eq_ignore_ascii_case("charset"))
            .map(|(_, v)| v.trim().trim_matches('"').to_string())
    }

    fn remote_addr(&self) -> Option<String> {
        self.extensions().get::<ClientAddr>().map(|addr| addr.0.ip().to_string())
    }

    fn request_uri(&self) -> Option<String> {
        Some(self.uri().path().to_string())
    }

    fn session_id(&self) -> Option<String> {
        self.extensions().get::<SessionId>().map(|s| s.0.clone())
    }

    fn user_principal(&self) -> Option<String> {
        self.extensions().get::<Principal>().map(|p| p.0.clone())
    }
}

fn query_pairs(uri: &http::Uri) -> impl Iterator<Item = (String, String)> + '_ {
    url::form_urlencoded::parse(uri.query().unwrap_or("").as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
}
