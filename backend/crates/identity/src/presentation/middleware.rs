//! Auth Middleware
//!
//! `authenticate` runs on every request and turns the application cookie
//! into a [`Principal`] in the request extensions. `require_authenticated`
//! guards the manage pages.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use platform::cookie::SetCookies;

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::principal::Principal;
use crate::domain::repository::IdentityStore;
use crate::navigation::routes::accounts;
use crate::presentation::handlers::IdentityAppState;

/// Read the application cookie. Expired or forged tickets are ignored.
/// Once the revalidation interval has passed the principal is checked
/// against the store: a valid one gets a re-issued cookie, an invalid one
/// is signed out.
pub async fn authenticate<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    let services = &state.services;
    let ctx = RequestContext::from_parts(req.method(), req.uri(), req.headers());
    let mut cookies = SetCookies::new();
    let now_ms = Utc::now().timestamp_millis();

    let principal = match services.sign_in.authenticate(&ctx) {
        Some(principal) if services.revalidation.needs_revalidation(&principal, now_ms) => {
            match services.revalidation.revalidate(&principal, now_ms).await {
                Some(refreshed) => {
                    if let Err(e) = services
                        .sign_in
                        .issue_application_cookie(&mut cookies, &refreshed)
                    {
                        tracing::error!(user_id = %refreshed.user_id, error = %e, "Failed to re-issue application cookie");
                    }
                    Some(refreshed)
                }
                None => {
                    services.sign_in.sign_out(&ctx, &mut cookies);
                    None
                }
            }
        }
        other => other,
    };

    if let Some(principal) = principal {
        req.extensions_mut().insert(principal);
    }

    let mut response = next.run(req).await;
    append_unless_set(&mut response, &cookies);
    response
}

/// Cookies the handler wrote itself (sign-out, refresh) take precedence.
fn append_unless_set(response: &mut Response, cookies: &SetCookies) {
    for cookie in cookies.iter() {
        let name = cookie.split_once('=').map_or(cookie, |(name, _)| name);
        let prefix = format!("{name}=");
        let already_set = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .any(|value| value.as_bytes().starts_with(prefix.as_bytes()));
        if already_set {
            continue;
        }
        if let Ok(value) = HeaderValue::from_str(cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
}

/// Anonymous visitors go to the sign-in page with the current URL as the
/// return target.
pub async fn require_authenticated<S, E>(
    State(state): State<IdentityAppState<S, E>>,
    req: Request<Body>,
    next: Next,
) -> Response
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    if req.extensions().get::<Principal>().is_some() {
        return next.run(req).await;
    }

    let return_url = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path().to_string(), |pq| pq.as_str().to_string());
    tracing::debug!(path = %req.uri().path(), "Anonymous request to a protected page");
    state
        .services
        .redirects
        .redirect_with_query(accounts::SIGN_IN, &[("returnUrl", Some(return_url.as_str()))])
        .into_response()
}
