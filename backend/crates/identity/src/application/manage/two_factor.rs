//! Two-factor authentication pages.
//!
//! Status and forget-browser, enabling an authenticator app, disabling 2FA,
//! resetting the key and regenerating recovery codes.

use platform::cookie::SetCookies;
use serde::{Deserialize, Serialize};

use crate::application::context::RequestContext;
use crate::application::email_sender::EmailSender;
use crate::application::flow::{Flow, Page};
use crate::application::services::IdentityServices;
use crate::application::validation::Validator;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::authenticator_key::strip_code;
use crate::error::{IdentityError, IdentityResult, RejectionExt};
use crate::navigation::routes::manage;

use super::current_user;

// ============================================================================
// Two-Factor Status
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoFactorStatusView {
    pub has_authenticator: bool,
    pub is_2fa_enabled: bool,
    pub is_machine_remembered: bool,
    pub recovery_codes_left: usize,
}

pub struct TwoFactorStatusPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> TwoFactorStatusPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<TwoFactorStatusView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        let users = &self.services.users;
        Ok(Flow::render(TwoFactorStatusView {
            has_authenticator: users.get_authenticator_key(&user).await?.is_some(),
            is_2fa_enabled: user.two_factor_enabled,
            is_machine_remembered: self.services.sign_in.is_two_factor_client_remembered(ctx, &user),
            recovery_codes_left: users.count_recovery_codes(&user).await?,
        }))
    }

    pub async fn forget_browser(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
    ) -> IdentityResult<Flow<TwoFactorStatusView>> {
        if let Err(redirect) = current_user(self.services, ctx).await? {
            return Ok(redirect.into());
        }

        self.services.sign_in.forget_two_factor_client(cookies);
        Ok(self
            .services
            .redirects
            .redirect_to_current_with_status(
                "The current browser has been forgotten. When you login again from this browser you will be prompted for your 2fa code.",
                ctx,
            )
            .into())
    }
}

// ============================================================================
// Disable 2FA
// ============================================================================

pub struct DisableTwoFactorPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> DisableTwoFactorPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<()>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        if !user.two_factor_enabled {
            return Err(IdentityError::InvalidOperation(
                "Cannot disable 2FA for user as it's not currently enabled.".to_string(),
            ));
        }
        Ok(Flow::render(()))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
    ) -> IdentityResult<Flow<()>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        let disabled = self
            .services
            .users
            .set_two_factor_enabled(&mut user, false)
            .await
            .rejection()?;
        if disabled.is_err() {
            return Err(IdentityError::InvalidOperation(
                "Unexpected error occurred disabling 2FA.".to_string(),
            ));
        }

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        tracing::info!(user_id = %user.id, "User has disabled 2fa.");
        Ok(self
            .services
            .redirects
            .redirect_with_status(
                manage::TWO_FACTOR_AUTHENTICATION,
                "2fa has been disabled. You can reenable 2fa when you setup an authenticator app",
            )
            .into())
    }
}

// ============================================================================
// Enable Authenticator
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerificationCodeForm {
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnableAuthenticatorView {
    pub shared_key: String,
    pub authenticator_uri: String,
    /// Base64 PNG of `authenticator_uri`.
    pub qr_code: Option<String>,
    /// Filled once, right after the first successful verification.
    pub recovery_codes: Vec<String>,
}

pub struct EnableAuthenticatorPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> EnableAuthenticatorPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    /// The user's key, created on first visit.
    async fn load_shared_key(&self, user: &mut User) -> IdentityResult<EnableAuthenticatorView> {
        let users = &self.services.users;
        let key = match users.get_authenticator_key(user).await? {
            Some(key) => key,
            None => users.reset_authenticator_key(user).await?,
        };

        let issuer = &self.services.config.application_name;
        let qr_code = key
            .qr_code_base64(issuer, user.email_str())
            .map_err(|e| tracing::warn!(error = %e, "Could not render the authenticator QR code"))
            .ok();
        Ok(EnableAuthenticatorView {
            shared_key: key.formatted(),
            authenticator_uri: key.authenticator_uri(issuer, user.email_str()),
            qr_code,
            recovery_codes: Vec::new(),
        })
    }

    pub async fn initialize(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
    ) -> IdentityResult<Flow<EnableAuthenticatorView>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        let stamp = user.security_stamp.clone();
        let view = self.load_shared_key(&mut user).await?;
        // Creating the key rotates the stamp; keep the session valid.
        if stamp != user.security_stamp {
            self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        }
        Ok(Flow::render(view))
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        form: VerificationCodeForm,
    ) -> IdentityResult<Flow<EnableAuthenticatorView>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        if let Err(errors) = Validator::new()
            .required("code", "Verification Code", &form.code)
            .string_length("code", "Verification Code", &form.code, 6, 7)
            .finish()
        {
            let view = self.load_shared_key(&mut user).await?;
            return Ok(Page::new(view).with_errors(errors).into());
        }

        let users = &self.services.users;
        let code = strip_code(&form.code);
        if !users.verify_authenticator_code(&user, &code).await? {
            let view = self.load_shared_key(&mut user).await?;
            return Ok(Page::new(view)
                .with_message("Error: Verification code is invalid.")
                .into());
        }

        users.set_two_factor_enabled(&mut user, true).await?;
        tracing::info!(user_id = %user.id, "User has enabled 2FA with an authenticator app.");

        const VERIFIED: &str = "Your authenticator app has been verified.";
        let flow = if users.count_recovery_codes(&user).await? == 0 {
            let count = self.services.config.recovery_code_count;
            let recovery_codes = users.generate_recovery_codes(&mut user, count).await?;
            let mut view = self.load_shared_key(&mut user).await?;
            view.recovery_codes = recovery_codes;
            Page::new(view).with_status(VERIFIED).into()
        } else {
            self.services
                .redirects
                .redirect_with_status(manage::TWO_FACTOR_AUTHENTICATION, VERIFIED)
                .into()
        };

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        Ok(flow)
    }
}

// ============================================================================
// Reset Authenticator
// ============================================================================

pub struct ResetAuthenticatorPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> ResetAuthenticatorPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<()>> {
        Ok(match current_user(self.services, ctx).await? {
            Ok(_) => Flow::render(()),
            Err(redirect) => redirect.into(),
        })
    }

    pub async fn submit(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
    ) -> IdentityResult<Flow<()>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };

        let users = &self.services.users;
        users.set_two_factor_enabled(&mut user, false).await?;
        users.reset_authenticator_key(&mut user).await?;
        tracing::info!(user_id = %user.id, "User has reset their authentication app key.");

        self.services.sign_in.refresh_sign_in(ctx, cookies, &user).await?;
        Ok(self
            .services
            .redirects
            .redirect_with_status(
                manage::ENABLE_AUTHENTICATOR,
                "Your authenticator app key has been reset, you will need to configure your authenticator app using the new key.",
            )
            .into())
    }
}

// ============================================================================
// Generate Recovery Codes
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryCodesView {
    pub recovery_codes: Vec<String>,
}

pub struct GenerateRecoveryCodesPage<'a, S: IdentityStore, E: EmailSender + Sync + 'static> {
    services: &'a IdentityServices<S, E>,
}

impl<'a, S: IdentityStore, E: EmailSender + Sync + 'static> GenerateRecoveryCodesPage<'a, S, E> {
    pub fn new(services: &'a IdentityServices<S, E>) -> Self {
        Self { services }
    }

    fn require_two_factor(user: &User) -> IdentityResult<()> {
        if user.two_factor_enabled {
            Ok(())
        } else {
            Err(IdentityError::InvalidOperation(
                "Cannot generate recovery codes for user because they do not have 2FA enabled."
                    .to_string(),
            ))
        }
    }

    pub async fn initialize(&self, ctx: &RequestContext) -> IdentityResult<Flow<RecoveryCodesView>> {
        let user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        Self::require_two_factor(&user)?;
        Ok(Flow::render(RecoveryCodesView {
            recovery_codes: Vec::new(),
        }))
    }

    pub async fn submit(&self, ctx: &RequestContext) -> IdentityResult<Flow<RecoveryCodesView>> {
        let mut user = match current_user(self.services, ctx).await? {
            Ok(user) => user,
            Err(redirect) => return Ok(redirect.into()),
        };
        Self::require_two_factor(&user)?;

        let count = self.services.config.recovery_code_count;
        let recovery_codes = self.services.users.generate_recovery_codes(&mut user, count).await?;
        tracing::info!(user_id = %user.id, "User has generated new 2FA recovery codes.");

        Ok(Page::new(RecoveryCodesView { recovery_codes })
            .with_status("You have generated new recovery codes.")
            .into())
    }
}
