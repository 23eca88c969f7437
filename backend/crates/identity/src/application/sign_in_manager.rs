//! Sign In Manager
//!
//! Password, two-factor and external sign-in, plus the cookies that carry
//! a sign-in between requests. Cookies are written to the `SetCookies` the
//! handler returns; nothing here touches a response directly.

use chrono::Utc;
use platform::cookie::{CookieConfig, SetCookies};
use platform::protector::TicketProtector;
use serde::{Deserialize, Serialize};

use crate::application::config::{IdentityConfig, millis};
use crate::application::context::RequestContext;
use crate::application::external::{EXTERNAL_PURPOSE, ExternalLoginInfo};
use crate::application::principal::{APPLICATION_PURPOSE, Principal};
use crate::application::user_manager::UserManager;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::UserId;
use crate::error::{IdentityError, IdentityResult};

const TWO_FACTOR_USER_PURPOSE: &str = "Identity.TwoFactorUserId";
const TWO_FACTOR_REMEMBER_ME_PURPOSE: &str = "Identity.TwoFactorRememberMe";

pub const PASSWORD_METHOD: &str = "pwd";
pub const MFA_METHOD: &str = "mfa";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInResult {
    Succeeded,
    /// Password accepted; a second factor is still needed.
    RequiresTwoFactor,
    LockedOut,
    /// Valid credentials, but the account may not sign in yet
    /// (unconfirmed email).
    NotAllowed,
    Failed,
}

/// Who is between the password step and the second factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TwoFactorUser {
    user_id: UserId,
    login_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RememberedClient {
    user_id: UserId,
    stamp: String,
}

pub struct SignInManager<S>
where
    S: IdentityStore,
{
    users: UserManager<S>,
    protector: TicketProtector,
}

impl<S> Clone for SignInManager<S>
where
    S: IdentityStore,
{
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            protector: self.protector.clone(),
        }
    }
}

impl<S> SignInManager<S>
where
    S: IdentityStore,
{
    pub fn new(users: UserManager<S>) -> Self {
        let protector = users.config().protector();
        Self { users, protector }
    }

    pub fn users(&self) -> &UserManager<S> {
        &self.users
    }

    fn config(&self) -> &IdentityConfig {
        self.users.config()
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn write_ticket<T: Serialize>(
        &self,
        cookies: &mut SetCookies,
        cookie: &CookieConfig,
        purpose: &str,
        data: &T,
        ttl_ms: i64,
    ) -> IdentityResult<()> {
        let ticket = self
            .protector
            .protect(purpose, data, Self::now_ms().saturating_add(ttl_ms))?;
        cookies.set(cookie, &ticket);
        Ok(())
    }

    /// `None` for a missing, forged or expired cookie.
    fn read_ticket<T: serde::de::DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        cookie_name: &str,
        purpose: &str,
    ) -> Option<T> {
        let ticket = ctx.cookie(cookie_name)?;
        self.protector
            .unprotect(purpose, ticket, Self::now_ms())
            .map_err(|e| tracing::debug!(cookie = cookie_name, error = %e, "Cookie ticket rejected"))
            .ok()
    }

    // ========================================================================
    // Principal / application cookie
    // ========================================================================

    pub async fn create_principal(
        &self,
        user: &User,
        is_persistent: bool,
        authentication_method: &str,
    ) -> IdentityResult<Principal> {
        let now = Self::now_ms();
        Ok(Principal {
            user_id: user.id,
            user_name: user.user_name.clone(),
            email: user.email.as_ref().map(|e| e.as_str().to_string()),
            security_stamp: self
                .users
                .supports_security_stamp()
                .then(|| user.security_stamp.as_str().to_string()),
            roles: self.users.get_roles(user).await?,
            claims: self.users.get_claims(user).await?,
            authentication_method: authentication_method.to_string(),
            is_persistent,
            issued_at_ms: now,
            validated_at_ms: now,
            expires_at_ms: now.saturating_add(millis(self.config().application_cookie_ttl)),
        })
    }

    /// Write `principal` into the application cookie.
    pub fn issue_application_cookie(
        &self,
        cookies: &mut SetCookies,
        principal: &Principal,
    ) -> IdentityResult<()> {
        let ticket = self
            .protector
            .protect(APPLICATION_PURPOSE, principal, principal.expires_at_ms)?;
        cookies.set(&self.config().application_cookie(principal.is_persistent), &ticket);
        Ok(())
    }

    /// Principal from the application cookie, if the ticket is intact and
    /// unexpired. Revalidation is up to the caller.
    pub fn authenticate(&self, ctx: &RequestContext) -> Option<Principal> {
        self.read_ticket(
            ctx,
            &self.config().application_cookie_name,
            APPLICATION_PURPOSE,
        )
    }

    pub async fn sign_in(
        &self,
        cookies: &mut SetCookies,
        user: &User,
        is_persistent: bool,
        authentication_method: &str,
    ) -> IdentityResult<()> {
        let principal = self
            .create_principal(user, is_persistent, authentication_method)
            .await?;
        self.issue_application_cookie(cookies, &principal)?;
        cookies.delete(&self.config().two_factor_user_cookie());
        tracing::info!(user_id = %user.id, method = authentication_method, "User signed in");
        Ok(())
    }

    /// Re-issue the cookie for `user` (new stamp, roles, claims), keeping
    /// the persistence and method of the current sign-in.
    pub async fn refresh_sign_in(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        user: &User,
    ) -> IdentityResult<()> {
        let (is_persistent, method) = ctx
            .principal()
            .filter(|p| p.user_id == user.id)
            .map(|p| (p.is_persistent, p.authentication_method.clone()))
            .unwrap_or((false, PASSWORD_METHOD.to_string()));
        let principal = self.create_principal(user, is_persistent, &method).await?;
        self.issue_application_cookie(cookies, &principal)
    }

    pub fn sign_out(&self, ctx: &RequestContext, cookies: &mut SetCookies) {
        let config = self.config();
        cookies.delete(&config.application_cookie(false));
        cookies.delete(&config.external_cookie());
        cookies.delete(&config.two_factor_user_cookie());
        if let Some(user_id) = ctx.user_id() {
            tracing::info!(user_id = %user_id, "User signed out");
        }
    }

    // ========================================================================
    // Password sign-in
    // ========================================================================

    pub async fn password_sign_in(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        user_name: &str,
        password: &str,
        is_persistent: bool,
        lockout_on_failure: bool,
    ) -> IdentityResult<SignInResult> {
        let Some(mut user) = self.users.find_by_name(user_name).await? else {
            return Ok(SignInResult::Failed);
        };

        match self
            .check_password_sign_in(&mut user, password, lockout_on_failure)
            .await?
        {
            SignInResult::Succeeded => {
                self.sign_in_or_two_factor(ctx, cookies, &user, is_persistent, None)
                    .await
            }
            other => Ok(other),
        }
    }

    pub async fn check_password_sign_in(
        &self,
        user: &mut User,
        password: &str,
        lockout_on_failure: bool,
    ) -> IdentityResult<SignInResult> {
        if let Some(result) = self.pre_sign_in_check(user) {
            return Ok(result);
        }

        if self.users.check_password(user, password).await? {
            if !user.two_factor_enabled {
                self.users.reset_access_failed_count(user).await?;
            }
            return Ok(SignInResult::Succeeded);
        }

        tracing::warn!(user_id = %user.id, "Invalid password for user");
        if lockout_on_failure {
            self.users.access_failed(user).await?;
            if self.users.is_locked_out(user) {
                return Ok(SignInResult::LockedOut);
            }
        }
        Ok(SignInResult::Failed)
    }

    fn pre_sign_in_check(&self, user: &User) -> Option<SignInResult> {
        if self.config().require_confirmed_account && !user.email_confirmed {
            tracing::warn!(user_id = %user.id, "User cannot sign in without a confirmed account");
            return Some(SignInResult::NotAllowed);
        }
        if self.users.is_locked_out(user) {
            tracing::warn!(user_id = %user.id, "User is currently locked out");
            return Some(SignInResult::LockedOut);
        }
        None
    }

    async fn sign_in_or_two_factor(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        user: &User,
        is_persistent: bool,
        login_provider: Option<&str>,
    ) -> IdentityResult<SignInResult> {
        let needs_second_factor = user.two_factor_enabled
            && self.users.get_authenticator_key(user).await?.is_some()
            && !self.is_two_factor_client_remembered(ctx, user);

        if needs_second_factor {
            let pending = TwoFactorUser {
                user_id: user.id,
                login_provider: login_provider.map(str::to_string),
            };
            self.write_ticket(
                cookies,
                &self.config().two_factor_user_cookie(),
                TWO_FACTOR_USER_PURPOSE,
                &pending,
                millis(self.config().two_factor_user_ttl),
            )?;
            return Ok(SignInResult::RequiresTwoFactor);
        }

        if login_provider.is_some() {
            cookies.delete(&self.config().external_cookie());
        }
        let method = login_provider.unwrap_or(PASSWORD_METHOD);
        self.sign_in(cookies, user, is_persistent, method).await?;
        Ok(SignInResult::Succeeded)
    }

    // ========================================================================
    // Two-factor
    // ========================================================================

    /// The user who passed the password step, if their cookie is still valid.
    pub async fn get_two_factor_authentication_user(
        &self,
        ctx: &RequestContext,
    ) -> IdentityResult<Option<User>> {
        match self.two_factor_user(ctx) {
            Some(pending) => self.users.find_by_id(&pending.user_id).await,
            None => Ok(None),
        }
    }

    fn two_factor_user(&self, ctx: &RequestContext) -> Option<TwoFactorUser> {
        self.read_ticket(
            ctx,
            &self.config().two_factor_user_cookie_name,
            TWO_FACTOR_USER_PURPOSE,
        )
    }

    async fn pending_two_factor(&self, ctx: &RequestContext) -> IdentityResult<(TwoFactorUser, User)> {
        let pending = self
            .two_factor_user(ctx)
            .ok_or(IdentityError::TwoFactorUserUnavailable)?;
        let user = self
            .users
            .find_by_id(&pending.user_id)
            .await?
            .ok_or(IdentityError::TwoFactorUserUnavailable)?;
        Ok((pending, user))
    }

    pub async fn two_factor_authenticator_sign_in(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        code: &str,
        is_persistent: bool,
        remember_client: bool,
    ) -> IdentityResult<SignInResult> {
        let (pending, mut user) = self.pending_two_factor(ctx).await?;
        if self.users.is_locked_out(&user) {
            return Ok(SignInResult::LockedOut);
        }

        if self.users.verify_authenticator_code(&user, code).await? {
            self.complete_two_factor(cookies, &mut user, &pending, is_persistent, remember_client)
                .await?;
            return Ok(SignInResult::Succeeded);
        }

        self.second_factor_failed(&mut user).await
    }

    pub async fn two_factor_recovery_code_sign_in(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        recovery_code: &str,
    ) -> IdentityResult<SignInResult> {
        let (pending, mut user) = self.pending_two_factor(ctx).await?;
        if self.users.is_locked_out(&user) {
            return Ok(SignInResult::LockedOut);
        }

        match self.users.redeem_recovery_code(&mut user, recovery_code).await {
            Ok(()) => {
                self.complete_two_factor(cookies, &mut user, &pending, false, false)
                    .await?;
                Ok(SignInResult::Succeeded)
            }
            Err(IdentityError::Rejected(_)) => self.second_factor_failed(&mut user).await,
            Err(e) => Err(e),
        }
    }

    async fn complete_two_factor(
        &self,
        cookies: &mut SetCookies,
        user: &mut User,
        pending: &TwoFactorUser,
        is_persistent: bool,
        remember_client: bool,
    ) -> IdentityResult<()> {
        self.users.reset_access_failed_count(user).await?;
        if remember_client {
            self.remember_two_factor_client(cookies, user)?;
        }
        if pending.login_provider.is_some() {
            cookies.delete(&self.config().external_cookie());
        }
        let method = pending.login_provider.as_deref().unwrap_or(MFA_METHOD);
        self.sign_in(cookies, user, is_persistent, method).await
    }

    async fn second_factor_failed(&self, user: &mut User) -> IdentityResult<SignInResult> {
        self.users.access_failed(user).await?;
        if self.users.is_locked_out(user) {
            Ok(SignInResult::LockedOut)
        } else {
            Ok(SignInResult::Failed)
        }
    }

    pub fn remember_two_factor_client(&self, cookies: &mut SetCookies, user: &User) -> IdentityResult<()> {
        let remembered = RememberedClient {
            user_id: user.id,
            stamp: user.security_stamp.as_str().to_string(),
        };
        self.write_ticket(
            cookies,
            &self.config().two_factor_remember_me_cookie(),
            TWO_FACTOR_REMEMBER_ME_PURPOSE,
            &remembered,
            millis(self.config().remember_machine_ttl),
        )
    }

    pub fn forget_two_factor_client(&self, cookies: &mut SetCookies) {
        cookies.delete(&self.config().two_factor_remember_me_cookie());
    }

    /// Remembered for this user and still matching their security stamp.
    pub fn is_two_factor_client_remembered(&self, ctx: &RequestContext, user: &User) -> bool {
        self.read_ticket::<RememberedClient>(
            ctx,
            &self.config().two_factor_remember_me_cookie_name,
            TWO_FACTOR_REMEMBER_ME_PURPOSE,
        )
        .is_some_and(|r| r.user_id == user.id && user.security_stamp.matches(&r.stamp))
    }

    // ========================================================================
    // External logins
    // ========================================================================

    pub async fn external_login_sign_in(
        &self,
        ctx: &RequestContext,
        cookies: &mut SetCookies,
        login_provider: &str,
        provider_key: &str,
        is_persistent: bool,
        bypass_two_factor: bool,
    ) -> IdentityResult<SignInResult> {
        let Some(user) = self.users.find_by_login(login_provider, provider_key).await? else {
            return Ok(SignInResult::Failed);
        };
        if let Some(result) = self.pre_sign_in_check(&user) {
            return Ok(result);
        }
        if bypass_two_factor {
            cookies.delete(&self.config().external_cookie());
            self.sign_in(cookies, &user, is_persistent, login_provider).await?;
            return Ok(SignInResult::Succeeded);
        }
        self.sign_in_or_two_factor(ctx, cookies, &user, is_persistent, Some(login_provider))
            .await
    }

    pub fn store_external_login_info(
        &self,
        cookies: &mut SetCookies,
        info: &ExternalLoginInfo,
    ) -> IdentityResult<()> {
        self.write_ticket(
            cookies,
            &self.config().external_cookie(),
            EXTERNAL_PURPOSE,
            info,
            millis(self.config().external_cookie_ttl),
        )
    }

    /// The provider identity from the external cookie. When linking,
    /// `expected_user` must be the user who started the challenge.
    pub fn get_external_login_info(
        &self,
        ctx: &RequestContext,
        expected_user: Option<&UserId>,
    ) -> Option<ExternalLoginInfo> {
        let info: ExternalLoginInfo =
            self.read_ticket(ctx, &self.config().external_cookie_name, EXTERNAL_PURPOSE)?;
        match expected_user {
            Some(user_id) if info.xsrf_user_id.as_deref() != Some(user_id.to_string().as_str()) => {
                tracing::warn!(user_id = %user_id, "External login cookie belongs to another user");
                None
            }
            _ => Some(info),
        }
    }

    pub fn clear_external_cookie(&self, cookies: &mut SetCookies) {
        cookies.delete(&self.config().external_cookie());
    }
}
