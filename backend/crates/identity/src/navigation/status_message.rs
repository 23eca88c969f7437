//! One-time status messages carried across a redirect.

use platform::cookie::{CookieConfig, SameSite, SetCookies};

use crate::application::context::RequestContext;

pub const STATUS_COOKIE_NAME: &str = "STATUS_MESSAGE";
const STATUS_COOKIE_MAX_AGE_SECS: i64 = 5;

/// The `STATUS_MESSAGE` cookie: strict same-site, http-only, five seconds.
///
/// There is no consent gate in this stack, so the cookie is always written.
#[derive(Debug, Clone)]
pub struct StatusMessageCookie {
    config: CookieConfig,
}

impl StatusMessageCookie {
    pub fn new(secure: bool) -> Self {
        Self {
            config: CookieConfig::new(STATUS_COOKIE_NAME)
                .secure(secure)
                .same_site(SameSite::Strict)
                .max_age_secs(Some(STATUS_COOKIE_MAX_AGE_SECS)),
        }
    }

    pub fn build(&self, message: &str) -> String {
        self.config.build_set_cookie(message)
    }

    /// Read the message and queue the cookie's deletion on the same
    /// response, so it is shown once.
    pub fn take(&self, ctx: &RequestContext, cookies: &mut SetCookies) -> Option<String> {
        let message = ctx.cookie(STATUS_COOKIE_NAME)?.to_string();
        cookies.delete(&self.config);
        Some(message)
    }

    /// The message a page shows: its own, if it has one, else the cookie's.
    /// The cookie is consumed either way.
    pub fn resolve(
        &self,
        explicit: Option<String>,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
    ) -> Option<String> {
        let from_cookie = self.take(ctx, cookies);
        explicit.or(from_cookie)
    }
}
