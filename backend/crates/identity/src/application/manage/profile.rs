//! Profile page (phone number).

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

use super::current_user;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfileForm {
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub username: String,
    pub phone_number: Option<String>,
}

impl ProfileView {
    fn of(user: &User) -> Self {
        Self {
            username: user.user_name.clone(),
            phone_number: user.phone_number.clone(),
        }
    }
}

pub struct ProfilePage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ProfilePage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<ProfileView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        Ok(Flow::render(ProfileView::of(&user)))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: ProfileForm,
    ) -> IdentityResult<Flow<ProfileView>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        if let Err(errors) = Validator::new()
            .phone("phoneNumber", "Phone number", form.phone_number.as_deref())
            .finish()
        {
            let view = ProfileView {
                username: user.user_name.clone(),
                phone_number: form.phone_number,
            };
            return Ok(Page::new(view).with_errors(errors).into());
        }

        let redirects = &self.services.redirects;
        let requested = form.phone_number.as_deref().map(str::trim).filter(|p| !p.is_empty());
        if requested != user.phone_number.as_deref() {
            let updated = self
                .services
                .users
                .set_phone_number(&mut user, requested)
                .await
                .rejection()?;
            if updated.is_err() {
                return Ok(redirects
                    .redirect_to_current_with_status("Error: Failed to set phone number.", ctx)
                    .into());
            }
        }

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        Ok(redirects
            .redirect_to_current_with_status("Your profile has been updated", ctx)
            .into())
    }
}
