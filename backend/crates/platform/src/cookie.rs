//! Cookie headers.
//!
//! Values are percent-encoded on write and decoded on read, so arbitrary
//! text (status messages with spaces and quotes) survives the round trip.

use axum::response::{IntoResponseParts, ResponseParts};
use http::{HeaderMap, HeaderValue, StatusCode, header};

const EPOCH_HTTP_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of one named cookie.
///
/// `max_age_secs: None` produces a session cookie.
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
    pub path: String,
    pub max_age_secs: Option<i64>,
}

impl CookieConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age_secs: None,
        }
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    pub fn max_age_secs(mut self, max_age_secs: Option<i64>) -> Self {
        self.max_age_secs = max_age_secs;
        self
    }

    /// `Set-Cookie` value writing `value`.
    pub fn build_set_cookie(&self, value: &str) -> String {
        let mut cookie = format!("{}={}", self.name, urlencoding::encode(value));
        if let Some(max_age) = self.max_age_secs {
            cookie.push_str(&format!("; Max-Age={max_age}"));
        }
        self.push_attributes(&mut cookie);
        cookie
    }

    /// `Set-Cookie` value expiring the cookie.
    ///
    /// Carries the same Path/SameSite/Secure attributes as the original so
    /// the browser matches and drops it.
    pub fn build_delete_cookie(&self) -> String {
        let mut cookie = format!("{}=; Max-Age=0; Expires={EPOCH_HTTP_DATE}", self.name);
        self.push_attributes(&mut cookie);
        cookie
    }

    fn push_attributes(&self, cookie: &mut String) {
        cookie.push_str(&format!("; Path={}", self.path));
        cookie.push_str(&format!("; SameSite={}", self.same_site.as_str()));
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
    }
}

/// Read and decode a request cookie.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| decode(value))
        })
}

/// All request cookies, decoded, in header order.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            Some((key.to_string(), decode(value)))
        })
        .collect()
}

fn decode(value: &str) -> String {
    urlencoding::decode(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

/// `Set-Cookie` values collected while a request is handled.
///
/// Handlers hand this out as `&mut` to whatever signs users in or out and
/// return it as a response part.
#[derive(Debug, Default, Clone)]
pub struct SetCookies(Vec<String>);

impl SetCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, config: &CookieConfig, value: &str) {
        self.0.push(config.build_set_cookie(value));
    }

    pub fn delete(&mut self, config: &CookieConfig) {
        self.0.push(config.build_delete_cookie());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Last header written for `name`, if any.
    pub fn find(&self, name: &str) -> Option<&str> {
        let prefix = format!("{name}=");
        self.iter().rev().find(|c| c.starts_with(&prefix))
    }
}

impl IntoResponseParts for SetCookies {
    type Error = (StatusCode, &'static str);

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        for cookie in self.0 {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "invalid Set-Cookie value"))?;
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Ok(res)
    }
}
