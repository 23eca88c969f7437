//! Response bodies
//!
//! A flow's outcome becomes either a `302` carrying its cookies or the JSON
//! page body `{ statusMessage, message, errors, data }`.

use axum::Json;
use axum::response::{IntoResponse, Response};
use http::header;
use platform::cookie::SetCookies;
use serde::Serialize;

use crate::application::context::RequestContext;
use crate::application::flow::Flow;
use crate::application::manage::PersonalDataDownload;
use crate::error::IdentityError;
use crate::navigation::RedirectManager;

/// Render a flow. A page without its own status message shows (and
/// consumes) the `STATUS_MESSAGE` cookie.
pub(crate) fn flow_response<T: Serialize>(
    redirects: &RedirectManager,
    ctx: &RequestContext,
    mut cookies: SetCookies,
    flow: Flow<T>,
) -> Response {
    match flow {
        Flow::Redirect(redirect) => (cookies, redirect).into_response(),
        Flow::Render(mut page) => {
            page.status_message =
                redirects
                    .status_cookie()
                    .resolve(page.status_message.take(), ctx, &mut cookies);
            (cookies, Json(page)).into_response()
        }
    }
}

// ============================================================================
// Home
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeView {
    pub is_authenticated: bool,
    pub user_name: Option<String>,
}

impl HomeView {
    pub fn from_context(ctx: &RequestContext) -> Self {
        Self {
            is_authenticated: ctx.is_authenticated(),
            user_name: ctx.principal().map(|p| p.user_name.clone()),
        }
    }
}

// ============================================================================
// Personal Data Download
// ============================================================================

impl IntoResponse for PersonalDataDownload {
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec_pretty(&self.data) {
            Ok(body) => body,
            Err(e) => return IdentityError::Internal(e.to_string()).into_response(),
        };
        (
            [
                (header::CONTENT_TYPE, "application/json".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.file_name),
                ),
            ],
            body,
        )
            .into_response()
    }
}
