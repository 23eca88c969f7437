//! External Login Page
//!
//! Landing page after a provider callback. A known login signs straight
//! in; an unknown one asks for an email and creates the account.

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::sign_in_manager::SignInResult;
use crate::application::validation::Validator;
use crate::domain::entity::{User, UserLogin};
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::Email;
use crate::error::{IdentityFailure, IdentityFailures, IdentityResult, RejectionExt};
use crate::navigation::routes::{SIGN_IN_CALLBACK_ACTION, accounts};

use super::email::send_confirmation_link;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalLoginQuery {
    pub remote_error: Option<String>,
    pub return_url: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalLoginForm {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLoginView {
    pub email: String,
    pub provider_display_name: String,
    pub return_url: Option<String>,
}

pub struct ExternalLoginPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ExternalLoginPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ExternalLoginQuery,
    ) -> IdentityResult<Flow<ExternalLoginView>> {
        let redirects = &self.services.redirects;
        if let Some(remote_error) = query.remote_error.as_deref() {
            return Ok(redirects
                .redirect_with_status(
                    accounts::SIGN_IN,
                    format!("Error from external provider: {remote_error}"),
                )
                .into());
        }

        if !(ctx.is_get() && query.action.as_deref() == Some(SIGN_IN_CALLBACK_ACTION)) {
            return Ok(redirects.redirect(Some(accounts::SIGN_IN)).into());
        }

        let sign_in = &self.services.sign_in;
        let Some(info) = sign_in.get_external_login_info(ctx, None) else {
            return Ok(redirects
                .redirect_with_status(accounts::SIGN_IN, "Error loading external login information.")
                .into());
        };

        // Provider sign-in already proved a factor of its own.
        let result = sign_in
            .external_login_sign_in(ctx, cookies, &info.login_provider, &info.provider_key, false, true)
            .await?;
        match result {
            SignInResult::Succeeded => {
                tracing::info!(provider = %info.login_provider, "User logged in with external provider.");
                Ok(redirects.redirect(query.return_url.as_deref()).into())
            }
            SignInResult::LockedOut => Ok(redirects.redirect(Some(accounts::LOCKOUT)).into()),
            _ => Ok(Flow::render(ExternalLoginView {
                email: info.email.clone().unwrap_or_default(),
                provider_display_name: info.provider_display_name,
                return_url: query.return_url.clone(),
            })),
        }
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ExternalLoginQuery,
        form: ExternalLoginForm,
    ) -> IdentityResult<Flow<ExternalLoginView>> {
        let redirects = &self.services.redirects;
        let sign_in = &self.services.sign_in;
        let Some(info) = sign_in.get_external_login_info(ctx, None) else {
            return Ok(redirects
                .redirect_with_status(
                    accounts::SIGN_IN,
                    "Error loading external login information during confirmation.",
                )
                .into());
        };

        let page = Page::new(ExternalLoginView {
            email: form.email.clone(),
            provider_display_name: info.provider_display_name.clone(),
            return_url: query.return_url.clone(),
        });
        if let Err(errors) = Validator::new()
            .required("email", "Email", &form.email)
            .email("email", "Email", &form.email)
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        let users = &self.services.users;
        if users
            .find_by_login(&info.login_provider, &info.provider_key)
            .await?
            .is_some()
        {
            let failures: IdentityFailures = IdentityFailure::login_already_associated().into();
            return Ok(page.with_failures(&failures).into());
        }

        let created = match Email::new(&form.email) {
            Ok(email) => users.create(User::new(email), None).await,
            Err(e) => Err(e),
        };
        let mut user = match created.rejection()? {
            Ok(user) => user,
            Err(failures) => return Ok(page.with_failures(&failures).into()),
        };

        let login = UserLogin {
            login_provider: info.login_provider.clone(),
            provider_key: info.provider_key.clone(),
            provider_display_name: Some(info.provider_display_name.clone()),
            user_id: user.id,
        };
        users.add_login(&mut user, login).await?;
        tracing::info!(
            user_id = %user.id,
            provider = %info.login_provider,
            "User created an account using external provider."
        );

        send_confirmation_link(self.services, &user, user.email_str()).await?;

        if users.config().require_confirmed_account {
            return Ok(redirects
                .redirect_with_query(
                    accounts::SIGN_UP_CONFIRMATION,
                    &[
                        ("email", Some(user.email_str())),
                        ("returnUrl", query.return_url.as_deref()),
                    ],
                )
                .into());
        }

        sign_in
            .sign_in(cookies, &user, false, &info.login_provider)
            .await?;
        sign_in.clear_external_cookie(cookies);
        Ok(redirects.redirect(query.return_url.as_deref()).into())
    }
}
