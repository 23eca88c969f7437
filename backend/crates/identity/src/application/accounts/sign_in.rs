//! Sign In Pages
//!
//! Password sign-in, then optionally the authenticator or recovery code
//! step. Lockout and the second factor are redirects, never loops.

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::external::ProviderScheme;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::sign_in_manager::SignInResult;
use crate::application::validation::Validator;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::authenticator_key::strip_code;
use crate::error::{IdentityError, IdentityResult};
use crate::navigation::routes::accounts;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReturnUrlQuery {
    pub return_url: Option<String>,
}

// ============================================================================
// Sign In
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignInForm {
    pub email: String,
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInView {
    pub email: String,
    pub remember_me: bool,
    pub return_url: Option<String>,
    pub external_providers: Vec<ProviderScheme>,
}

pub struct SignInPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> SignInPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    fn view(&self, query: &ReturnUrlQuery, form: &SignInForm) -> SignInView {
        SignInView {
            email: form.email.clone(),
            remember_me: form.remember_me,
            return_url: query.return_url.clone(),
            external_providers: self.services.providers.schemes(),
        }
    }

    /// A fresh visit drops any half-finished external login.
    pub fn initialize(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ReturnUrlQuery,
    ) -> Flow<SignInView> {
        if ctx.is_get() {
            self.services.sign_in.clear_external_cookie(cookies);
        }
        Flow::render(self.view(query, &SignInForm::default()))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ReturnUrlQuery,
        form: SignInForm,
    ) -> IdentityResult<Flow<SignInView>> {
        let page = Page::new(self.view(query, &form));
        if let Err(errors) = Validator::new()
            .required("email", "Email", &form.email)
            .email("email", "Email", &form.email)
            .required("password", "Password", &form.password)
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        let result = self
            .services
            .sign_in
            .password_sign_in(ctx, cookies, form.email.trim(), &form.password, form.remember_me, false)
            .await?;

        let redirects = &self.services.redirects;
        Ok(match result {
            SignInResult::Succeeded => {
                tracing::info!("User logged in.");
                redirects.redirect(query.return_url.as_deref()).into()
            }
            SignInResult::RequiresTwoFactor => redirects
                .redirect_with_query(
                    accounts::SIGN_IN_TWO_FACTOR,
                    &[
                        ("returnUrl", query.return_url.as_deref()),
                        ("rememberMe", Some(bool_str(form.remember_me))),
                    ],
                )
                .into(),
            SignInResult::LockedOut => {
                tracing::warn!("User account locked out.");
                redirects.redirect(Some(accounts::LOCKOUT)).into()
            }
            SignInResult::NotAllowed | SignInResult::Failed => {
                page.with_message("Error: Invalid login attempt.").into()
            }
        })
    }
}

fn bool_str(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Only reachable after the password step.
async fn two_factor_user<S: IdentityStore, E: EmailSender + Sync + 'static>(
    services: &IdentityServices<S, E>,
    ctx: &RequestContext,
) -> IdentityResult<User> {
    services
        .sign_in
        .get_two_factor_authentication_user(ctx)
        .await?
        .ok_or(IdentityError::TwoFactorUserUnavailable)
}

// ============================================================================
// Sign In with Two-Factor Authentication
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TwoFactorQuery {
    pub return_url: Option<String>,
    pub remember_me: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TwoFactorForm {
    pub two_factor_code: String,
    pub remember_machine: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorView {
    pub return_url: Option<String>,
    pub remember_me: bool,
    pub remember_machine: bool,
}

pub struct TwoFactorSignInPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> TwoFactorSignInPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    fn view(query: &TwoFactorQuery, remember_machine: bool) -> TwoFactorView {
        TwoFactorView {
            return_url: query.return_url.clone(),
            remember_me: query.remember_me,
            remember_machine,
        }
    }

    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        query: &TwoFactorQuery,
    ) -> IdentityResult<Flow<TwoFactorView>> {
        two_factor_user(self.services, ctx).await?;
        Ok(Flow::render(Self::view(query, false)))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &TwoFactorQuery,
        form: TwoFactorForm,
    ) -> IdentityResult<Flow<TwoFactorView>> {
        let user = two_factor_user(self.services, ctx).await?;
        let page = Page::new(Self::view(query, form.remember_machine));
        if let Err(errors) = Validator::new()
            .required("twoFactorCode", "Authenticator code", &form.two_factor_code)
            .string_length("twoFactorCode", "Authenticator code", &form.two_factor_code, 6, 7)
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        let code = strip_code(&form.two_factor_code);
        let result = self
            .services
            .sign_in
            .two_factor_authenticator_sign_in(ctx, cookies, &code, query.remember_me, form.remember_machine)
            .await?;

        let redirects = &self.services.redirects;
        Ok(match result {
            SignInResult::Succeeded => {
                tracing::info!(user_id = %user.id, "User logged in with 2fa.");
                redirects.redirect(query.return_url.as_deref()).into()
            }
            SignInResult::LockedOut => {
                tracing::warn!(user_id = %user.id, "User account locked out.");
                redirects.redirect(Some(accounts::LOCKOUT)).into()
            }
            _ => {
                tracing::warn!(user_id = %user.id, "Invalid authenticator code entered.");
                page.with_message("Error: Invalid authenticator code.").into()
            }
        })
    }
}

// ============================================================================
// Sign In with Recovery Code
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecoveryCodeForm {
    pub recovery_code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCodeView {
    pub return_url: Option<String>,
}

pub struct RecoveryCodeSignInPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> RecoveryCodeSignInPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        query: &ReturnUrlQuery,
    ) -> IdentityResult<Flow<RecoveryCodeView>> {
        two_factor_user(self.services, ctx).await?;
        Ok(Flow::render(RecoveryCodeView {
            return_url: query.return_url.clone(),
        }))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ReturnUrlQuery,
        form: RecoveryCodeForm,
    ) -> IdentityResult<Flow<RecoveryCodeView>> {
        let user = two_factor_user(self.services, ctx).await?;
        let page = Page::new(RecoveryCodeView {
            return_url: query.return_url.clone(),
        });
        if let Err(errors) = Validator::new()
            .required("recoveryCode", "Recovery Code", &form.recovery_code)
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        let code = form.recovery_code.replace(' ', "");
        let result = self
            .services
            .sign_in
            .two_factor_recovery_code_sign_in(ctx, cookies, &code)
            .await?;

        let redirects = &self.services.redirects;
        Ok(match result {
            SignInResult::Succeeded => {
                tracing::info!(user_id = %user.id, "User logged in with a recovery code.");
                redirects.redirect(query.return_url.as_deref()).into()
            }
            SignInResult::LockedOut => {
                tracing::warn!("User account locked out.");
                redirects.redirect(Some(accounts::LOCKOUT)).into()
            }
            _ => {
                tracing::warn!(user_id = %user.id, "Invalid recovery code entered.");
                page.with_message("Error: Invalid recovery code entered.").into()
            }
        })
    }
}
