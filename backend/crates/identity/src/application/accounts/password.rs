//! Forgot / reset password pages.
//!
//! Neither page reveals whether an address belongs to an account.

use serde::{Deserialize, Serialize};

use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::validation::Validator;
use crate::domain::repository::IdentityStore;
use crate::error::{IdentityResult, RejectionExt};
use crate::navigation::routes::accounts;

use super::email::{EmailForm, EmailView};

// ============================================================================
// Forgot Password
// ============================================================================

pub struct ForgotPasswordPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ForgotPasswordPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub fn initialize(&self) -> Flow<EmailView> {
        Flow::render(EmailView {
            email: String::new(),
        })
    }

    pub async fn submit(&self, form: EmailForm) -> IdentityResult<Flow<EmailView>> {
        if let Err(errors) = Validator::new()
            .required("email", "Email", &form.email)
            .email("email", "Email", &form.email)
            .finish()
        {
            return Ok(Page::new(EmailView { email: form.email })
                .with_errors(errors)
                .into());
        }

        let confirmation = self
            .services
            .redirects
            .redirect(Some(accounts::FORGOT_PASSWORD_CONFIRMATION));

        let users = &self.services.users;
        let Some(user) = users
            .find_by_email(&form.email)
            .await?
            .filter(|user| user.email_confirmed)
        else {
            return Ok(confirmation.into());
        };

        let code = users.generate_password_reset_token(&user)?;
        let callback_url = self
            .services
            .redirects
            .absolute_uri(accounts::RESET_PASSWORD, &[("code", Some(code.as_str()))]);
        self.services
            .email_sender
            .send_password_reset_link(&user, form.email.trim(), &callback_url)
            .await?;
        tracing::info!(user_id = %user.id, "Password reset link sent");

        Ok(confirmation.into())
    }
}

// ============================================================================
// Reset Password
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordQuery {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordView {
    pub email: String,
    pub code: String,
}

pub struct ResetPasswordPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ResetPasswordPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    /// The code arrives through the emailed link; without it the page is
    /// useless.
    pub fn initialize(&self, query: &ResetPasswordQuery) -> Flow<ResetPasswordView> {
        match query.code.as_deref().filter(|code| !code.is_empty()) {
            Some(code) => Flow::render(ResetPasswordView {
                email: String::new(),
                code: code.to_string(),
            }),
            None => self
                .services
                .redirects
                .redirect(Some(accounts::INVALID_PASSWORD_RESET))
                .into(),
        }
    }

    pub async fn submit(&self, form: ResetPasswordForm) -> IdentityResult<Flow<ResetPasswordView>> {
        let page = Page::new(ResetPasswordView {
            email: form.email.clone(),
            code: form.code.clone(),
        });
        if let Err(errors) = Validator::new()
            .required("email", "Email", &form.email)
            .email("email", "Email", &form.email)
            .required("password", "Password", &form.password)
            .string_length("password", "Password", &form.password, 6, 100)
            .compare(
                "confirmPassword",
                &form.confirm_password,
                &form.password,
                "The password and confirmation password do not match.",
            )
            .required("code", "Code", &form.code)
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        let confirmation = self
            .services
            .redirects
            .redirect(Some(accounts::RESET_PASSWORD_CONFIRMATION));

        let users = &self.services.users;
        let Some(mut user) = users.find_by_email(&form.email).await? else {
            return Ok(confirmation.into());
        };

        match users
            .reset_password(&mut user, &form.code, &form.password)
            .await
            .rejection()?
        {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "User reset their password");
                Ok(confirmation.into())
            }
            Err(failures) => Ok(page.with_failures(&failures).into()),
        }
    }
}
