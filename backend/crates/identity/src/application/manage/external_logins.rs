//! External logins page: list, remove and link provider logins.

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::external::ProviderScheme;
use crate::application::flow::Flow;
use crate::application::services::IdentityServices;
use crate::domain::entity::{User, UserLogin};
use crate::domain::repository::IdentityStore;
use crate::error::{IdentityResult, RejectionExt};
use crate::navigation::routes::LINK_SIGN_IN_CALLBACK_ACTION;

use super::current_user;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalLoginsQuery {
    pub action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoveLoginForm {
    pub login_provider: String,
    pub provider_key: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalLoginsView {
    pub current_logins: Vec<UserLogin>,
    /// Configured providers the user has not linked yet.
    pub other_logins: Vec<ProviderScheme>,
    /// The last way in can't be removed.
    pub show_remove_button: bool,
}

pub struct ExternalLoginsPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ExternalLoginsPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        query: &ExternalLoginsQuery,
    ) -> IdentityResult<Flow<ExternalLoginsView>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        if ctx.is_get() && query.action.as_deref() == Some(LINK_SIGN_IN_CALLBACK_ACTION) {
            return self.link_login_callback(ctx, cookies, &mut user).await;
        }

        let current_logins = self.services.users.get_logins(&user).await?;
        let other_logins = self
            .services
            .providers
            .schemes()
            .into_iter()
            .filter(|scheme| {
                !current_logins
                    .iter()
                    .any(|login| login.login_provider == scheme.name)
            })
            .collect();
        let show_remove_button = user.has_password() || current_logins.len() > 1;

        Ok(Flow::render(ExternalLoginsView {
            current_logins,
            other_logins,
            show_remove_button,
        }))
    }

    pub async fn remove_login(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: RemoveLoginForm,
    ) -> IdentityResult<Flow<ExternalLoginsView>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        let users = &self.services.users;
        let redirects = &self.services.redirects;
        const NOT_REMOVED: &str = "Error: The external login was not removed.";

        let logins = users.get_logins(&user).await?;
        if !user.has_password() && logins.len() <= 1 {
            return Ok(redirects.redirect_to_current_with_status(NOT_REMOVED, ctx).into());
        }

        let removed = users
            .remove_login(&mut user, &form.login_provider, &form.provider_key)
            .await
            .rejection()?;
        if removed.is_err() {
            return Ok(redirects.redirect_to_current_with_status(NOT_REMOVED, ctx).into());
        }

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        tracing::info!(user_id = %user.id, provider = %form.login_provider, "User removed an external login");
        Ok(redirects
            .redirect_to_current_with_status("The external login was removed.", ctx)
            .into())
    }

    /// Back from the provider after a link challenge. The external cookie
    /// must have been issued for this same user.
    async fn link_login_callback(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        user: &mut User,
    ) -> IdentityResult<Flow<ExternalLoginsView>> {
        let redirects = &self.services.redirects;
        let sign_in = &self.services.sign_in;
        let Some(info) = sign_in.get_external_login_info(ctx, Some(&user.id)) else {
            return Ok(redirects
                .redirect_to_current_with_status("Error: Could not load external login info.", ctx)
                .into());
        };

        let login = UserLogin {
            login_provider: info.login_provider.clone(),
            provider_key: info.provider_key,
            provider_display_name: Some(info.provider_display_name),
            user_id: user.id,
        };
        if self.services.users.add_login(user, login).await.rejection()?.is_err() {
            return Ok(redirects
                .redirect_to_current_with_status(
                    "Error: The external login was not added. External logins can only be associated with one account.",
                    ctx,
                )
                .into());
        }

        sign_in.clear_external_cookie(cookies);
        tracing::info!(user_id = %user.id, provider = %info.login_provider, "User linked an external login");
        Ok(redirects
            .redirect_to_current_with_status("The external login was added.", ctx)
            .into())
    }
}
