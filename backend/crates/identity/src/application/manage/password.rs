//! Change / set password pages.
//!
//! Accounts created from an external login have no password; they land on
//! set-password until they add one.

use platform::cookie::SetCookies;
use serde::Deserialize;

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::validation::Validator;
use crate::domain::repository::IdentityStore;
use crate::error::{IdentityResult, RejectionExt};
use crate::navigation::routes::manage;

use super::current_user;

const CONFIRMATION_MISMATCH: &str = "The new password and confirmation password do not match.";

// ============================================================================
// Change Password
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordForm {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

pub struct ChangePasswordPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ChangePasswordPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<()>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        if !user.has_password() {
            return Ok(self.services.redirects.redirect(Some(manage::SET_PASSWORD)).into());
        }
        Ok(Flow::render(()))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: ChangePasswordForm,
    ) -> IdentityResult<Flow<()>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        if let Err(errors) = Validator::new()
            .required("oldPassword", "Current password", &form.old_password)
            .required("newPassword", "New password", &form.new_password)
            .string_length("newPassword", "New password", &form.new_password, 6, 100)
            .compare("confirmPassword", &form.confirm_password, &form.new_password, CONFIRMATION_MISMATCH)
            .finish()
        {
            return Ok(Page::new(()).with_errors(errors).into());
        }

        let changed = self
            .services
            .users
            .change_password(&mut user, &form.old_password, &form.new_password)
            .await
            .rejection()?;
        if let Err(failures) = changed {
            return Ok(Page::new(()).with_failures(&failures).into());
        }

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        tracing::info!(user_id = %user.id, "User changed their password successfully.");
        Ok(self
            .services
            .redirects
            .redirect_to_current_with_status("Your password has been changed", ctx)
            .into())
    }
}

// ============================================================================
// Set Password
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetPasswordForm {
    pub new_password: String,
    pub confirm_password: String,
}

pub struct SetPasswordPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> SetPasswordPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<()>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        if user.has_password() {
            return Ok(self.services.redirects.redirect(Some(manage::CHANGE_PASSWORD)).into());
        }
        Ok(Flow::render(()))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: SetPasswordForm,
    ) -> IdentityResult<Flow<()>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        if let Err(errors) = Validator::new()
            .required("newPassword", "New password", &form.new_password)
            .string_length("newPassword", "New password", &form.new_password, 6, 100)
            .compare("confirmPassword", &form.confirm_password, &form.new_password, CONFIRMATION_MISMATCH)
            .finish()
        {
            return Ok(Page::new(()).with_errors(errors).into());
        }

        let added = self
            .services
            .users
            .add_password(&mut user, &form.new_password)
            .await
            .rejection()?;
        if let Err(failures) = added {
            return Ok(Page::new(()).with_failures(&failures).into());
        }

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        tracing::info!(user_id = %user.id, "User set a password");
        Ok(self
            .services
            .redirects
            .redirect_to_current_with_status("Your password has been set.", ctx)
            .into())
    }
}
