//! Request Context
//!
//! Everything a flow may know about the current request, passed explicitly
//! instead of read from ambient state.

use http::{HeaderMap, Method, Uri};

use crate::application::principal::Principal;
use crate::domain::value_object::UserId;

#[derive(Debug, Clone)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    cookies: Vec<(String, String)>,
    principal: Option<Principal>,
}

impl RequestContext {
    /// `uri` is a path with an optional query (`/accounts/signin?returnUrl=%2F`).
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (uri, None),
        };
        Self {
            method,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            cookies: Vec::new(),
            principal: None,
        }
    }

    pub fn from_parts(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        Self {
            method: method.clone(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            cookies: platform::cookie::parse_cookies(headers),
            principal: None,
        }
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_principal(mut self, principal: Option<Principal>) -> Self {
        self.principal = principal;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{query}", self.path),
            None => self.path.clone(),
        }
    }

    /// First request cookie named `name`.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.principal.as_ref().map(|p| p.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderValue, header};

    #[test]
    fn test_new_splits_query() {
        let ctx = RequestContext::new(Method::GET, "/accounts/signin?returnUrl=%2F");
        assert_eq!(ctx.path(), "/accounts/signin");
        assert_eq!(ctx.path_and_query(), "/accounts/signin?returnUrl=%2F");
        assert!(ctx.is_get());
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn test_from_parts_reads_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("STATUS_MESSAGE=saved%21; other=1"),
        );
        let uri: Uri = "/accounts/manage?tab=email".parse().unwrap();
        let ctx = RequestContext::from_parts(&Method::POST, &uri, &headers);
        assert_eq!(ctx.cookie("STATUS_MESSAGE"), Some("saved!"));
        assert_eq!(ctx.cookie("missing"), None);
        assert_eq!(ctx.path_and_query(), "/accounts/manage?tab=email");
    }
}
