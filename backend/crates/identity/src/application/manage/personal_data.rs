//! Personal data pages: view, download and delete.

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::validation::Validator;
use crate::domain::repository::IdentityStore;
use crate::error::{IdentityError, IdentityResult, RejectionExt};
use crate::navigation::Redirect;

use super::current_user;

pub const PERSONAL_DATA_FILE_NAME: &str = "PersonalData.json";

/// The JSON attachment returned by the download endpoint.
#[derive(Debug, Clone)]
pub struct PersonalDataDownload {
    pub file_name: &'static str,
    pub data: Map<String, Value>,
}

pub struct PersonalDataPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> PersonalDataPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<()>> {
        Ok(match current_user(self.services, ctx).await? {
            Ok(_) => Flow::render(()),
            Err(redirect) => redirect.into(),
        })
    }

    pub async fn download(
        &self,
        ctx: &RequestContext,
    ) -> IdentityResult<Result<PersonalDataDownload, Redirect>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(Err(redirect)),
        };

        let data = self.services.users.personal_data(&user).await?;
        tracing::info!(user_id = %user.id, "User asked for their personal data.");
        Ok(Ok(PersonalDataDownload {
            file_name: PERSONAL_DATA_FILE_NAME,
            data,
        }))
    }
}

// ============================================================================
// Delete Personal Data
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PasswordForm {
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePersonalDataView {
    /// Accounts without a password delete without confirmation.
    pub require_password: bool,
}

pub struct DeletePersonalDataPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> DeletePersonalDataPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<DeletePersonalDataView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        Ok(Flow::render(DeletePersonalDataView {
            require_password: user.has_password(),
        }))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: PasswordForm,
    ) -> IdentityResult<Flow<DeletePersonalDataView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        let users = &self.services.users;
        let require_password = user.has_password();
        if require_password {
            let page = Page::new(DeletePersonalDataView { require_password });
            if let Err(errors) = Validator::new()
                .required("password", "Password", &form.password)
                .finish()
            {
                return Ok(page.with_errors(errors).into());
            }
            if !users.check_password(&user, &form.password).await? {
                return Ok(page.with_message("Error: Incorrect password.").into());
            }
        }

        if users.delete(&user).await.rejection()?.is_err() {
            return Err(IdentityError::InvalidOperation(
                "Unexpected error occurred deleting user.".to_string(),
            ));
        }

        self.services.sign_in.sign_out(ctx, cookies);
        tracing::info!(user_id = %user.id, "User deleted themselves.");
        Ok(self.services.redirects.redirect_to_current(ctx).into())
    }
}
