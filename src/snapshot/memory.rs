use super::RequestSource;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// In-memory request built up field by field.
///
/// Asking for the session id of a request without one creates a session with a fresh UUID,
/// mirroring how a servlet container creates sessions on demand.
#[derive(Debug, Default)]
pub struct StaticRequest {
    method: Option<String>,
    request_uri: Option<String>,
    headers: Vec<(String, Vec<String>)>,
    cookies: Vec<(String, String)>,
    parameters: Vec<(String, Vec<String>)>,
    attributes: BTreeMap<String, String>,
    locales: Vec<String>,
    auth_type: Option<String>,
    character_encoding: Option<String>,
    context_path: Option<String>,
    servlet_path: Option<String>,
    remote_addr: Option<String>,
    principal: Option<String>,
    session: Mutex<Option<String>>,
}

impl StaticRequest {
    pub fn new(method: impl Into<String>, request_uri: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            request_uri: Some(request_uri.into()),
            ..Self::default()
        }
    }

    /// Append a header value; repeated names accumulate values.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push_multi(&mut self.headers, name.into(), value.into());
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Append a parameter value; repeated names accumulate values.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        push_multi(&mut self.parameters, name.into(), value.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locales.push(locale.into());
        self
    }

    pub fn auth_type(mut self, auth_type: impl Into<String>) -> Self {
        self.auth_type = Some(auth_type.into());
        self
    }

    pub fn character_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.character_encoding = Some(encoding.into());
        self
    }

    pub fn context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = Some(path.into());
        self
    }

    pub fn servlet_path(mut self, path: impl Into<String>) -> Self {
        self.servlet_path = Some(path.into());
        self
    }

    pub fn remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    pub fn principal(mut self, name: impl Into<String>) -> Self {
        self.principal = Some(name.into());
        self
    }

    /// Start with an existing session.
    pub fn session(self, id: impl Into<String>) -> Self {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = Some(id.into());
        self
    }

    pub fn has_session(&self) -> bool {
        self.session.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }
}

fn push_multi(entries: &mut Vec<(String, Vec<String>)>, name: String, value: String) {
    match entries.iter_mut().find(|(n, _)| *n == name) {
        Some((_, values)) => values.push(value),
        None => entries.push((name, vec![value])),
    }
}

fn values_of(entries: &[(String, Vec<String>)], name: &str) -> Vec<String> {
    entries.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone()).unwrap_or_default()
}

impl RequestSource for StaticRequest {
    fn method(&self) -> Option<String> {
        self.method.clone()
    }

    fn header_names(&self) -> Vec<String> {
        self.headers.iter().map(|(n, _)| n.clone()).collect()
    }

    fn header_values(&self, name: &str) -> Vec<String> {
        values_of(&self.headers, name)
    }

    fn attribute_names(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.cookies.clone()
    }

    fn locales(&self) -> Vec<String> {
        self.locales.clone()
    }

    fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|(n, _)| n.clone()).collect()
    }

    fn parameter_values(&self, name: &str) -> Vec<String> {
        values_of(&self.parameters, name)
    }

    fn auth_type(&self) -> Option<String> {
        self.auth_type.clone()
    }

    fn character_encoding(&self) -> Option<String> {
        self.character_encoding.clone()
    }

    fn context_path(&self) -> Option<String> {
        self.context_path.clone()
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.clone()
    }

    fn request_uri(&self) -> Option<String> {
        self.request_uri.clone()
    }

    fn servlet_path(&self) -> Option<String> {
        self.servlet_path.clone()
    }

    fn session_id(&self) -> Option<String> {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        Some(session.get_or_insert_with(|| uuid::Uuid::new_v4().to_string()).clone())
    }

    fn user_principal(&self) -> Option<String> {
        self.principal.clone()
    }
}
