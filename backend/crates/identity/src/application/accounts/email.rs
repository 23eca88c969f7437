//! Email confirmation pages.

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::validation::Validator;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::error::{IdentityResult, RejectionExt};
use crate::navigation::routes::{self, accounts};

pub(crate) const VERIFICATION_SENT: &str = "Verification email sent. Please check your email.";

// ============================================================================
// Confirm Email
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmEmailQuery {
    pub user_id: Option<String>,
    pub code: Option<String>,
}

pub struct ConfirmEmailPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ConfirmEmailPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, query: &ConfirmEmailQuery) -> IdentityResult<Flow<()>> {
        let (Some(user_id), Some(code)) = (query.user_id.as_deref(), query.code.as_deref()) else {
            return Ok(self.services.redirects.redirect(Some(routes::HOME)).into());
        };

        let users = &self.services.users;
        let Some(mut user) = users.find_by_id_str(user_id).await? else {
            return Ok(Page::new(()).with_status("Error loading user information.").into());
        };

        let status = match users.confirm_email(&mut user, code).await.rejection()? {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "User confirmed their email");
                "Thank you for confirming your email."
            }
            Err(_) => "Error confirming your email.",
        };
        Ok(Page::new(()).with_status(status).into())
    }
}

// ============================================================================
// Confirm Email Change
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfirmEmailChangeQuery {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub code: Option<String>,
}

pub struct ConfirmEmailChangePage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ConfirmEmailChangePage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ConfirmEmailChangeQuery,
    ) -> IdentityResult<Flow<()>> {
        let (Some(user_id), Some(email), Some(code)) = (
            query.user_id.as_deref(),
            query.email.as_deref(),
            query.code.as_deref(),
        ) else {
            return Ok(self
                .services
                .redirects
                .redirect_with_status(accounts::SIGN_IN, "Error: Invalid email change confirmation link.")
                .into());
        };

        let users = &self.services.users;
        let Some(mut user) = users.find_by_id_str(user_id).await? else {
            return Ok(Page::new(()).with_message("Unable to find user by its Id").into());
        };

        if users.change_email(&mut user, email, code).await.rejection()?.is_err() {
            return Ok(Page::new(()).with_message("Error changing email.").into());
        }

        // The email doubles as the user name.
        if users.set_user_name(&mut user, email).await.rejection()?.is_err() {
            return Ok(Page::new(()).with_message("Error changing user name.").into());
        }

        // The link may be opened in a browser signed in as someone else.
        if ctx.user_id() == Some(user.id) {
            self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        }
        tracing::info!(user_id = %user.id, "User changed their email");
        Ok(Page::new(())
            .with_message("Thank you for confirming your email change.")
            .into())
    }
}

// ============================================================================
// Resend Email Confirmation
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailForm {
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailView {
    pub email: String,
}

pub struct ResendEmailConfirmationPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ResendEmailConfirmationPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub fn initialize(&self) -> Flow<EmailView> {
        Flow::render(EmailView {
            email: String::new(),
        })
    }

    /// Answers the same whether or not the address is known.
    pub async fn submit(&self, form: EmailForm) -> IdentityResult<Flow<EmailView>> {
        let page = Page::new(EmailView {
            email: form.email.clone(),
        });
        if let Err(errors) = Validator::new()
            .required("email", "Email", &form.email)
            .email("email", "Email", &form.email)
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        if let Some(user) = self.services.users.find_by_email(&form.email).await? {
            send_confirmation_link(self.services, &user, form.email.trim()).await?;
        }
        Ok(page.with_message(VERIFICATION_SENT).into())
    }
}

/// Email `user` a fresh confirmation link for `email`.
pub(crate) async fn send_confirmation_link<S: IdentityStore, E: EmailSender + Sync + 'static>(
    services: &IdentityServices<S, E>,
    user: &User,
    email: &str,
) -> IdentityResult<()> {
    let code = services.users.generate_email_confirmation_token(user)?;
    let user_id = user.id.to_string();
    let callback_url = services.redirects.absolute_uri(
        accounts::CONFIRM_EMAIL,
        &[("userId", Some(user_id.as_str())), ("code", Some(code.as_str()))],
    );
    services
        .email_sender
        .send_confirmation_link(user, email, &callback_url)
        .await
}
