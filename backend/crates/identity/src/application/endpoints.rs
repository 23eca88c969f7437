//! Account Endpoints
//!
//! The non-page routes: external sign-in and link challenges, the provider
//! callback, and sign-out.

use axum::response::{IntoResponse, Response};
use chrono::Utc;
use http::{HeaderValue, StatusCode, header};
use platform::cookie::SetCookies;
use serde::Deserialize;
use url::Url;

use crate::application::config::millis;
use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::external::AuthenticationProperties;
use crate::application::manage::current_user;
use crate::application::services::IdentityServices;
use crate::domain::repository::IdentityStore;
use crate::error::{IdentityError, IdentityResult};
use crate::navigation::Redirect;
use crate::navigation::redirect::{append_query, with_query};
use crate::navigation::routes::{
    EXTERNAL_CALLBACK_PREFIX, LINK_SIGN_IN_CALLBACK_ACTION, SIGN_IN_CALLBACK_ACTION, accounts,
    manage,
};

/// `302` to an external provider. Unlike [`Redirect`], the target is
/// deliberately off-site.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    location: Url,
}

impl Challenge {
    pub fn location(&self) -> &Url {
        &self.location
    }
}

impl IntoResponse for Challenge {
    fn into_response(self) -> Response {
        match HeaderValue::from_str(self.location.as_str()) {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalSignInForm {
    pub provider: String,
    pub return_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LinkProviderForm {
    pub provider: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignOutForm {
    pub return_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExternalCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub struct AccountEndpoints<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> AccountEndpoints<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    fn callback_uri(&self, provider: &str) -> String {
        self.services
            .redirects
            .absolute_uri(&format!("{EXTERNAL_CALLBACK_PREFIX}/{provider}"), &[])
    }

    fn challenge(
        &self,
        provider_name: &str,
        redirect_uri: String,
        xsrf_user_id: Option<String>,
    ) -> IdentityResult<Challenge> {
        let providers = &self.services.providers;
        let provider = providers.find(provider_name)?;
        let properties = AuthenticationProperties {
            redirect_uri,
            provider: provider.name.clone(),
            xsrf_user_id,
        };
        let expires_at_ms = Utc::now()
            .timestamp_millis()
            .saturating_add(millis(self.services.config.external_cookie_ttl));
        let state = providers.protect_state(
            &self.services.config.protector(),
            &properties,
            expires_at_ms,
        )?;

        tracing::debug!(provider = %provider.name, "Challenging external provider");
        Ok(Challenge {
            location: providers.authorization_url(
                provider,
                &self.callback_uri(&provider.name),
                &state,
            ),
        })
    }

    /// `POST /perform-external-signin`
    pub fn perform_external_sign_in(&self, form: &ExternalSignInForm) -> IdentityResult<Challenge> {
        let redirect_uri = with_query(
            accounts::EXTERNAL_LOGIN,
            &[
                ("returnUrl", form.return_url.as_deref()),
                ("action", Some(SIGN_IN_CALLBACK_ACTION)),
            ],
        );
        self.challenge(&form.provider, redirect_uri, None)
    }

    /// `POST /link-external-signin-provider`. The challenge is bound to the
    /// signed-in user so the callback cannot attach the login elsewhere.
    pub async fn link_external_sign_in_provider(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: &LinkProviderForm,
    ) -> IdentityResult<Result<Challenge, Redirect>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(Err(redirect)),
        };

        // Drop any stale external cookie before starting a new round trip.
        self.services.sign_in.clear_external_cookie(cookies);

        let redirect_uri = with_query(
            manage::EXTERNAL_LOGINS,
            &[("action", Some(LINK_SIGN_IN_CALLBACK_ACTION))],
        );
        self.challenge(&form.provider, redirect_uri, Some(user.id.to_string()))
            .map(Ok)
    }

    /// `POST /signout`
    pub fn sign_out(&self, ctx: &RequestContext, cookies: &mut SetCookies, form: &SignOutForm) -> Redirect {
        self.services.sign_in.sign_out(ctx, cookies);
        self.services.redirects.redirect(form.return_url.as_deref())
    }

    /// `GET /signin-external/{provider}`: exchange the code, park the
    /// provider identity in the external cookie and continue to the page
    /// the challenge named.
    pub async fn external_callback(
        &self,
        cookies: &mut SetCookies,
        provider_name: &str,
        query: &ExternalCallbackQuery,
    ) -> IdentityResult<Redirect> {
        let providers = &self.services.providers;
        let provider = providers.find(provider_name)?;
        let state = query.state.as_deref().ok_or(IdentityError::InvalidToken)?;
        let properties = providers.unprotect_state(
            &self.services.config.protector(),
            state,
            Utc::now().timestamp_millis(),
        )?;
        if !properties.provider.eq_ignore_ascii_case(&provider.name) {
            tracing::warn!(provider = %provider.name, "External callback state was issued for another provider");
            return Err(IdentityError::InvalidToken);
        }

        let redirects = &self.services.redirects;
        let remote_error = |message: &str| {
            redirects.redirect(Some(&append_query(&properties.redirect_uri, "remoteError", message)))
        };

        if let Some(error) = query.error.as_deref() {
            tracing::warn!(provider = %provider.name, error, "External provider returned an error");
            return Ok(remote_error(error));
        }
        let Some(code) = query.code.as_deref() else {
            return Ok(remote_error("The provider returned no authorization code."));
        };

        let mut info = match providers.exchange(provider, code, &self.callback_uri(&provider.name)).await {
            Ok(info) => info,
            Err(IdentityError::ExternalProvider(message)) => {
                tracing::error!(provider = %provider.name, error = %message, "External login exchange failed");
                return Ok(remote_error("The external login provider could not be reached."));
            }
            Err(e) => return Err(e),
        };
        info.xsrf_user_id = properties.xsrf_user_id.clone();
        self.services.sign_in.store_external_login_info(cookies, &info)?;

        Ok(redirects.redirect(Some(&properties.redirect_uri)))
    }
}
