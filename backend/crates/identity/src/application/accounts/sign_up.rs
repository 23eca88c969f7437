//! Sign Up Pages

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};

use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::sign_in_manager::PASSWORD_METHOD;
use crate::application::validation::Validator;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::Email;
use crate::error::{IdentityResult, RejectionExt};
use crate::navigation::routes::{self, accounts};

use super::sign_in::ReturnUrlQuery;

// ============================================================================
// Sign Up
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpView {
    pub email: String,
    pub return_url: Option<String>,
}

pub struct SignUpPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> SignUpPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub fn initialize(&self, query: &ReturnUrlQuery) -> Flow<SignUpView> {
        Flow::render(SignUpView {
            email: String::new(),
            return_url: query.return_url.clone(),
        })
    }

    pub async fn submit(
        &self,
        cookies: &mut SetCookies,
        query: &ReturnUrlQuery,
        form: SignUpForm,
    ) -> IdentityResult<Flow<SignUpView>> {
        let page = Page::new(SignUpView {
            email: form.email.clone(),
            return_url: query.return_url.clone(),
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
            .finish()
        {
            return Ok(page.with_errors(errors).into());
        }

        let users = &self.services.users;
        let created = match Email::new(&form.email) {
            Ok(email) => users.create(User::new(email), Some(&form.password)).await,
            Err(e) => Err(e),
        };
        let user = match created.rejection()? {
            Ok(user) => user,
            Err(failures) => return Ok(page.with_failures(&failures).into()),
        };
        tracing::info!(user_id = %user.id, "User created a new account with password.");

        let code = users.generate_email_confirmation_token(&user)?;
        let user_id = user.id.to_string();
        let callback_url = self.services.redirects.absolute_uri(
            accounts::CONFIRM_EMAIL,
            &[
                ("userId", Some(user_id.as_str())),
                ("code", Some(code.as_str())),
                ("returnUrl", query.return_url.as_deref()),
            ],
        );
        self.services
            .email_sender
            .send_confirmation_link(&user, user.email_str(), &callback_url)
            .await?;

        let redirects = &self.services.redirects;
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

        self.services
            .sign_in
            .sign_in(cookies, &user, false, PASSWORD_METHOD)
            .await?;
        Ok(redirects.redirect(query.return_url.as_deref()).into())
    }
}

// ============================================================================
// Sign Up Confirmation
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignUpConfirmationQuery {
    pub email: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpConfirmationView {
    pub email: String,
    /// Shown only while no real email sender is configured.
    pub email_confirmation_link: Option<String>,
}

pub struct SignUpConfirmationPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> SignUpConfirmationPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(
        &self,
        query: &SignUpConfirmationQuery,
    ) -> IdentityResult<Flow<SignUpConfirmationView>> {
        let Some(email) = query.email.as_deref() else {
            return Ok(self.services.redirects.redirect(Some(routes::HOME)).into());
        };

        let mut view = SignUpConfirmationView {
            email: email.to_string(),
            email_confirmation_link: None,
        };
        let Some(user) = self.services.users.find_by_email(email).await? else {
            return Ok(Page::new(view)
                .with_status("Error finding user for unspecified email")
                .into());
        };

        if self.services.email_sender.displays_links() {
            let code = self.services.users.generate_email_confirmation_token(&user)?;
            let user_id = user.id.to_string();
            view.email_confirmation_link = Some(self.services.redirects.absolute_uri(
                accounts::CONFIRM_EMAIL,
                &[
                    ("userId", Some(user_id.as_str())),
                    ("code", Some(code.as_str())),
                    ("returnUrl", query.return_url.as_deref()),
                ],
            ));
        }
        Ok(Flow::render(view))
    }
}
