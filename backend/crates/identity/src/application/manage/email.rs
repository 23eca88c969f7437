//! Manage email page.
//!
//! A new address only takes effect once the link sent to it is opened
//! (see the confirm-email-change page).

use serde::{Deserialize, Serialize};

use crate::application::accounts::email::{VERIFICATION_SENT, send_confirmation_link};
use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::validation::Validator;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::normalize_key;
use crate::error::IdentityResult;
use crate::navigation::routes::{accounts, manage};

use super::current_user;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeEmailForm {
    pub new_email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManageEmailView {
    pub email: String,
    pub is_email_confirmed: bool,
    pub new_email: String,
}

impl ManageEmailView {
    fn of(user: &User, new_email: String) -> Self {
        Self {
            email: user.email_str().to_string(),
            is_email_confirmed: user.email_confirmed,
            new_email,
        }
    }
}

pub struct ManageEmailPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ManageEmailPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<ManageEmailView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        let view = ManageEmailView::of(&user, user.email_str().to_string());
        Ok(Flow::render(view))
    }

    pub async fn change_email(
        &self,
        ctx: &RequestContext,
        form: ChangeEmailForm,
    ) -> IdentityResult<Flow<ManageEmailView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        if let Err(errors) = Validator::new()
            .required("newEmail", "New email", &form.new_email)
            .email("newEmail", "New email", &form.new_email)
            .finish()
        {
            return Ok(Page::new(ManageEmailView::of(&user, form.new_email))
                .with_errors(errors)
                .into());
        }

        let redirects = &self.services.redirects;
        let new_email = form.new_email.trim();
        if user.normalized_email.as_deref() == Some(normalize_key(new_email).as_str()) {
            return Ok(redirects
                .redirect_to_current_with_status("Your email is unchanged.", ctx)
                .into());
        }

        let code = self.services.users.generate_change_email_token(&user, new_email)?;
        let user_id = user.id.to_string();
        let callback_url = redirects.absolute_uri(
            accounts::CONFIRM_EMAIL_CHANGE,
            &[
                ("userId", Some(user_id.as_str())),
                ("email", Some(new_email)),
                ("code", Some(code.as_str())),
            ],
        );
        self.services
            .email_sender
            .send_confirmation_link(&user, new_email, &callback_url)
            .await?;

        Ok(redirects
            .redirect_to_current_with_status(
                "Confirmation link to change email sent. Please check your email.",
                ctx,
            )
            .into())
    }

    /// Posted from the email page; lands back on it.
    pub async fn send_verification_email(
        &self,
        ctx: &RequestContext,
    ) -> IdentityResult<Flow<ManageEmailView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        send_confirmation_link(self.services, &user, user.email_str()).await?;
        Ok(self
            .services
            .redirects
            .redirect_with_status(manage::EMAIL, VERIFICATION_SENT)
            .into())
    }
}
