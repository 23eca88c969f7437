//! Redirects and the redirect manager.
//!
//! A [`Redirect`] is a value. Handlers return it and nothing after the
//! return runs, which is all "terminal" needs to mean here.

use axum::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use url::Url;
use url::form_urlencoded;

use super::status_message::StatusMessageCookie;
use crate::application::context::RequestContext;

/// A `302 Found` to a same-origin location, optionally carrying a status
/// message cookie.
#[must_use = "a redirect only takes effect when returned from the handler"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
    status_message: Option<String>,
    status_cookie: Option<String>,
}

impl Redirect {
    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let Ok(location) = HeaderValue::from_str(&self.location) else {
            tracing::error!(location = %self.location, "Redirect location is not a valid header");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        let mut response = (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
        if let Some(cookie) = self.status_cookie.and_then(|c| HeaderValue::from_str(&c).ok()) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
        response
    }
}

/// Builds every redirect the account UI issues.
///
/// Targets that are not well-formed relative references are first reduced
/// to a path relative to the application base, so a redirect can never
/// leave the site.
#[derive(Debug, Clone)]
pub struct RedirectManager {
    base: Url,
    status_cookie: StatusMessageCookie,
}

impl RedirectManager {
    pub fn new(base: Url, status_cookie: StatusMessageCookie) -> Self {
        Self {
            base,
            status_cookie,
        }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn status_cookie(&self) -> &StatusMessageCookie {
        &self.status_cookie
    }

    /// Back to the current request path. The query is dropped, so a
    /// callback (`?action=...`) does not run twice.
    pub fn redirect_to_current(&self, ctx: &RequestContext) -> Redirect {
        self.redirect(Some(ctx.path()))
    }

    pub fn redirect(&self, uri: Option<&str>) -> Redirect {
        Redirect {
            location: self.resolve(uri.unwrap_or_default()),
            status_message: None,
            status_cookie: None,
        }
    }

    /// Replace the query of `uri` with `params`. `None` values are dropped.
    pub fn redirect_with_query(&self, uri: &str, params: &[(&str, Option<&str>)]) -> Redirect {
        self.redirect(Some(&with_query(uri, params)))
    }

    pub fn redirect_to_current_with_status(
        &self,
        message: impl Into<String>,
        ctx: &RequestContext,
    ) -> Redirect {
        self.with_status(self.redirect_to_current(ctx), message.into())
    }

    pub fn redirect_with_status(&self, uri: &str, message: impl Into<String>) -> Redirect {
        self.with_status(self.redirect(Some(uri)), message.into())
    }

    fn with_status(&self, mut redirect: Redirect, message: String) -> Redirect {
        redirect.status_cookie = Some(self.status_cookie.build(&message));
        redirect.status_message = Some(message);
        redirect
    }

    /// Absolute URI (same origin) for `path`, used in emailed links and as
    /// the provider callback address.
    pub fn absolute_uri(&self, path: &str, params: &[(&str, Option<&str>)]) -> String {
        let target = with_query(path.trim_start_matches('/'), params);
        self.base
            .join(&target)
            .map(String::from)
            .unwrap_or_else(|_| self.base.to_string())
    }

    fn resolve(&self, uri: &str) -> String {
        let relative = if is_well_formed_relative(uri) {
            uri.to_string()
        } else {
            self.to_base_relative_path(uri)
        };

        match self.base.join(&relative) {
            Ok(url) if url.origin() == self.base.origin() && !is_network_path(url.path()) => {
                location_of(&url)
            }
            Ok(url) if url.origin() == self.base.origin() => {
                tracing::warn!(target_uri = %uri, "Redirect target collapses to a network path; using the base path");
                location_of(&self.base)
            }
            _ => location_of(&self.base),
        }
    }

    fn to_base_relative_path(&self, uri: &str) -> String {
        let Ok(url) = Url::parse(uri) else {
            tracing::warn!(target_uri = %uri, "Redirect target is malformed; using the base path");
            return String::new();
        };
        if let Some(rest) = url.as_str().strip_prefix(self.base.as_str()) {
            return rest.to_string();
        }
        tracing::warn!(target_uri = %uri, "Redirect target is outside the application; keeping only its path");
        let mut relative = url.path().trim_start_matches('/').to_string();
        if let Some(query) = url.query() {
            relative.push('?');
            relative.push_str(query);
        }
        relative
    }
}

/// True for references that cannot change scheme or host: no scheme, no
/// `//authority`, no backslashes browsers would read as slashes.
fn is_well_formed_relative(uri: &str) -> bool {
    if uri.starts_with("//") || uri.contains('\\') || uri.chars().any(char::is_control) {
        return false;
    }
    matches!(Url::parse(uri), Err(url::ParseError::RelativeUrlWithoutBase))
}

/// Dot segments can normalize `/.//host/x` into `//host/x`, which a browser
/// reads as another origin.
fn is_network_path(path: &str) -> bool {
    path.starts_with("//") || path.starts_with("/\\")
}

/// `uri` with its query replaced by `params`; `None` values are dropped.
pub(crate) fn with_query(uri: &str, params: &[(&str, Option<&str>)]) -> String {
    let without_query = uri.split(['?', '#']).next().unwrap_or_default();
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    let query = serializer.finish();
    if query.is_empty() {
        without_query.to_string()
    } else {
        format!("{without_query}?{query}")
    }
}

/// `uri` with one more query parameter, keeping the existing ones.
pub(crate) fn append_query(uri: &str, key: &str, value: &str) -> String {
    let pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(key, value)
        .finish();
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{pair}")
}

fn location_of(url: &Url) -> String {
    let mut location = url.path().to_string();
    if let Some(query) = url.query() {
        location.push('?');
        location.push_str(query);
    }
    location
}
