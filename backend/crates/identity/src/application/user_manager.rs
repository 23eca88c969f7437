//! User Manager
//!
//! Every change to a user goes through here. Credential changes rotate the
//! security stamp; every write replaces the concurrency stamp and fails
//! with `ConcurrencyFailure` when someone else wrote first.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::password::{ClearTextPassword, HashedPassword};
use serde_json::{Map, Value};

use crate::application::config::IdentityConfig;
use crate::application::token_provider::{TokenProvider, TokenPurpose};
use crate::domain::entity::user_token::{
    AUTHENTICATOR_KEY_TOKEN, INTERNAL_LOGIN_PROVIDER, RECOVERY_CODES_TOKEN,
};
use crate::domain::entity::{User, UserClaim, UserLogin, UserToken};
use crate::domain::repository::IdentityStore;
use crate::domain::value_object::{
    AuthenticatorKey, ConcurrencyStamp, Email, RecoveryCodeSet, UserId, normalize_key,
};
use crate::error::{IdentityError, IdentityFailure, IdentityFailures, IdentityResult};

/// Characters allowed in user names (the email address doubles as one).
const ALLOWED_USER_NAME_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-._@+";

pub struct UserManager<S>
where
    S: IdentityStore,
{
    store: Arc<S>,
    config: Arc<IdentityConfig>,
    tokens: TokenProvider,
}

impl<S> Clone for UserManager<S>
where
    S: IdentityStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            tokens: self.tokens.clone(),
        }
    }
}

impl<S> UserManager<S>
where
    S: IdentityStore,
{
    pub fn new(store: Arc<S>, config: Arc<IdentityConfig>) -> Self {
        let tokens = TokenProvider::new(config.protector(), config.token_lifespan);
        Self {
            store,
            config,
            tokens,
        }
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    pub fn supports_security_stamp(&self) -> bool {
        self.store.supports_security_stamp()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub async fn find_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>> {
        self.store.find_user_by_id(user_id).await
    }

    /// Unparseable ids find nobody.
    pub async fn find_by_id_str(&self, user_id: &str) -> IdentityResult<Option<User>> {
        match user_id.trim().parse::<UserId>() {
            Ok(id) => self.find_by_id(&id).await,
            Err(_) => Ok(None),
        }
    }

    pub async fn find_by_name(&self, user_name: &str) -> IdentityResult<Option<User>> {
        self.store.find_user_by_name(&normalize_key(user_name)).await
    }

    pub async fn find_by_email(&self, email: &str) -> IdentityResult<Option<User>> {
        self.store.find_user_by_email(&normalize_key(email)).await
    }

    pub async fn find_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<Option<User>> {
        self.store.find_user_by_login(login_provider, provider_key).await
    }

    // ========================================================================
    // Create / update / delete
    // ========================================================================

    /// Create `user`, optionally with a password.
    pub async fn create(&self, mut user: User, password: Option<&str>) -> IdentityResult<User> {
        self.validate_user(&user).await?;
        if let Some(password) = password {
            let password = self.validate_password(password)?;
            user.password_hash = Some(self.hash_password(password).await?);
        }
        self.store.create_user(&user).await?;
        tracing::info!(user_id = %user.id, "User created");
        Ok(user)
    }

    /// Persist `user` under optimistic concurrency.
    pub async fn update(&self, user: &mut User) -> IdentityResult<()> {
        self.validate_user(user).await?;
        let expected = std::mem::replace(&mut user.concurrency_stamp, ConcurrencyStamp::generate());
        if self.store.update_user(user, expected.as_str()).await? {
            Ok(())
        } else {
            user.concurrency_stamp = expected;
            tracing::warn!(user_id = %user.id, "Concurrent update rejected");
            Err(IdentityError::rejected(IdentityFailure::concurrency_failure()))
        }
    }

    pub async fn delete(&self, user: &User) -> IdentityResult<()> {
        if self.store.delete_user(&user.id).await? {
            Ok(())
        } else {
            Err(IdentityError::rejected(IdentityFailure::default_error()))
        }
    }

    async fn validate_user(&self, user: &User) -> IdentityResult<()> {
        let mut failures = Vec::new();
        let name = user.user_name.as_str();
        if name.trim().is_empty() || !name.chars().all(|c| ALLOWED_USER_NAME_CHARS.contains(c)) {
            failures.push(IdentityFailure::invalid_user_name(name));
        } else if let Some(owner) = self.store.find_user_by_name(&user.normalized_user_name).await? {
            if owner.id != user.id {
                failures.push(IdentityFailure::duplicate_user_name(name));
            }
        }
        if let Some(email) = &user.email {
            if !Email::is_valid(email.as_str()) {
                failures.push(IdentityFailure::invalid_email(email.as_str()));
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(IdentityFailures::new(failures).into())
        }
    }

    // ========================================================================
    // Passwords
    // ========================================================================

    pub fn validate_password(&self, password: &str) -> IdentityResult<ClearTextPassword> {
        let password = ClearTextPassword::new(password);
        self.config
            .password_policy
            .validate(&password)
            .map_err(|violations| {
                IdentityFailures::new(violations.into_iter().map(IdentityFailure::from).collect())
            })?;
        Ok(password)
    }

    async fn hash_password(&self, password: ClearTextPassword) -> IdentityResult<String> {
        let pepper = self.config.password_pepper.clone();
        let hashed = tokio::task::spawn_blocking(move || password.hash(pepper.as_deref()))
            .await
            .map_err(|e| IdentityError::Internal(format!("Password hashing task failed: {e}")))??;
        Ok(hashed.as_phc_string().to_string())
    }

    /// `false` for users without a password.
    pub async fn check_password(&self, user: &User, password: &str) -> IdentityResult<bool> {
        let Some(stored) = user.password_hash.clone() else {
            return Ok(false);
        };
        let password = ClearTextPassword::new(password);
        let pepper = self.config.password_pepper.clone();
        tokio::task::spawn_blocking(move || {
            HashedPassword::from_phc_string(stored)
                .map(|hash| hash.verify(&password, pepper.as_deref()))
                .unwrap_or(false)
        })
        .await
        .map_err(|e| IdentityError::Internal(format!("Password verification task failed: {e}")))
    }

    pub async fn change_password(
        &self,
        user: &mut User,
        current_password: &str,
        new_password: &str,
    ) -> IdentityResult<()> {
        if !self.check_password(user, current_password).await? {
            tracing::warn!(user_id = %user.id, "Change password failed: incorrect current password");
            return Err(IdentityError::rejected(IdentityFailure::password_mismatch()));
        }
        self.set_password(user, new_password).await
    }

    pub async fn add_password(&self, user: &mut User, password: &str) -> IdentityResult<()> {
        if user.has_password() {
            return Err(IdentityError::rejected(IdentityFailure::user_already_has_password()));
        }
        self.set_password(user, password).await
    }

    pub async fn reset_password(
        &self,
        user: &mut User,
        token: &str,
        new_password: &str,
    ) -> IdentityResult<()> {
        if !self.verify_token(user, &TokenPurpose::ResetPassword, token) {
            return Err(IdentityError::rejected(IdentityFailure::invalid_token()));
        }
        self.set_password(user, new_password).await
    }

    async fn set_password(&self, user: &mut User, password: &str) -> IdentityResult<()> {
        let password = self.validate_password(password)?;
        user.password_hash = Some(self.hash_password(password).await?);
        user.rotate_security_stamp();
        self.update(user).await
    }

    // ========================================================================
    // Tokens, email, user name, phone
    // ========================================================================

    pub fn generate_email_confirmation_token(&self, user: &User) -> IdentityResult<String> {
        self.tokens
            .generate(user, &TokenPurpose::EmailConfirmation, Utc::now())
    }

    pub fn generate_change_email_token(&self, user: &User, new_email: &str) -> IdentityResult<String> {
        self.tokens
            .generate(user, &TokenPurpose::ChangeEmail(new_email.to_string()), Utc::now())
    }

    pub fn generate_password_reset_token(&self, user: &User) -> IdentityResult<String> {
        self.tokens
            .generate(user, &TokenPurpose::ResetPassword, Utc::now())
    }

    fn verify_token(&self, user: &User, purpose: &TokenPurpose, token: &str) -> bool {
        self.tokens.validate(user, purpose, token, Utc::now())
    }

    pub async fn confirm_email(&self, user: &mut User, token: &str) -> IdentityResult<()> {
        if !self.verify_token(user, &TokenPurpose::EmailConfirmation, token) {
            return Err(IdentityError::rejected(IdentityFailure::invalid_token()));
        }
        user.email_confirmed = true;
        self.update(user).await
    }

    /// Sets the new address as confirmed. The user name is left alone.
    pub async fn change_email(&self, user: &mut User, new_email: &str, token: &str) -> IdentityResult<()> {
        let purpose = TokenPurpose::ChangeEmail(new_email.to_string());
        if !self.verify_token(user, &purpose, token) {
            return Err(IdentityError::rejected(IdentityFailure::invalid_token()));
        }
        user.set_email(Some(Email::new(new_email)?));
        user.email_confirmed = true;
        user.rotate_security_stamp();
        self.update(user).await
    }

    pub async fn set_user_name(&self, user: &mut User, user_name: &str) -> IdentityResult<()> {
        user.set_user_name(user_name);
        user.rotate_security_stamp();
        self.update(user).await
    }

    pub async fn set_phone_number(&self, user: &mut User, phone_number: Option<&str>) -> IdentityResult<()> {
        user.phone_number = phone_number
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        user.phone_number_confirmed = false;
        user.rotate_security_stamp();
        self.update(user).await
    }

    // ========================================================================
    // Two-factor
    // ========================================================================

    pub async fn set_two_factor_enabled(&self, user: &mut User, enabled: bool) -> IdentityResult<()> {
        user.two_factor_enabled = enabled;
        user.rotate_security_stamp();
        self.update(user).await
    }

    pub async fn get_authenticator_key(&self, user: &User) -> IdentityResult<Option<AuthenticatorKey>> {
        self.store
            .find_token(&user.id, INTERNAL_LOGIN_PROVIDER, AUTHENTICATOR_KEY_TOKEN)
            .await?
            .filter(|key| !key.is_empty())
            .map(AuthenticatorKey::from_stored)
            .transpose()
    }

    pub async fn reset_authenticator_key(&self, user: &mut User) -> IdentityResult<AuthenticatorKey> {
        let key = AuthenticatorKey::generate();
        self.store
            .set_token(&UserToken::internal(user.id, AUTHENTICATOR_KEY_TOKEN, key.as_str()))
            .await?;
        user.rotate_security_stamp();
        self.update(user).await?;
        Ok(key)
    }

    pub async fn verify_authenticator_code(&self, user: &User, code: &str) -> IdentityResult<bool> {
        let Some(key) = self.get_authenticator_key(user).await? else {
            return Ok(false);
        };
        let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        key.verify(code, now)
    }

    /// Replace the user's recovery codes with `count` new ones.
    pub async fn generate_recovery_codes(
        &self,
        user: &mut User,
        count: usize,
    ) -> IdentityResult<Vec<String>> {
        let (set, codes) = RecoveryCodeSet::generate(count);
        self.store
            .set_token(&UserToken::internal(user.id, RECOVERY_CODES_TOKEN, set.to_stored()))
            .await?;
        self.update(user).await?;
        Ok(codes)
    }

    async fn recovery_codes(&self, user: &User) -> IdentityResult<RecoveryCodeSet> {
        let stored = self
            .store
            .find_token(&user.id, INTERNAL_LOGIN_PROVIDER, RECOVERY_CODES_TOKEN)
            .await?;
        Ok(RecoveryCodeSet::from_stored(stored.as_deref().unwrap_or_default()))
    }

    pub async fn count_recovery_codes(&self, user: &User) -> IdentityResult<usize> {
        Ok(self.recovery_codes(user).await?.count())
    }

    pub async fn redeem_recovery_code(&self, user: &mut User, code: &str) -> IdentityResult<()> {
        let mut codes = self.recovery_codes(user).await?;
        if !codes.redeem(code) {
            return Err(IdentityError::rejected(IdentityFailure::recovery_code_redemption_failed()));
        }
        self.store
            .set_token(&UserToken::internal(user.id, RECOVERY_CODES_TOKEN, codes.to_stored()))
            .await?;
        self.update(user).await
    }

    // ========================================================================
    // External logins
    // ========================================================================

    /// A login belongs to at most one user, the current one included.
    pub async fn add_login(&self, user: &mut User, login: UserLogin) -> IdentityResult<()> {
        if self
            .find_by_login(&login.login_provider, &login.provider_key)
            .await?
            .is_some()
        {
            return Err(IdentityError::rejected(IdentityFailure::login_already_associated()));
        }
        self.store
            .add_login(&UserLogin {
                user_id: user.id,
                ..login
            })
            .await?;
        self.update(user).await
    }

    pub async fn remove_login(
        &self,
        user: &mut User,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<()> {
        if !self
            .store
            .remove_login(&user.id, login_provider, provider_key)
            .await?
        {
            return Err(IdentityError::rejected(IdentityFailure::default_error()));
        }
        user.rotate_security_stamp();
        self.update(user).await
    }

    pub async fn get_logins(&self, user: &User) -> IdentityResult<Vec<UserLogin>> {
        self.store.find_logins(&user.id).await
    }

    // ========================================================================
    // Lockout
    // ========================================================================

    pub fn is_locked_out(&self, user: &User) -> bool {
        user.is_locked_out(Utc::now())
    }

    /// Count a failed attempt; lock the account once the limit is reached.
    pub async fn access_failed(&self, user: &mut User) -> IdentityResult<()> {
        self.record_access_failure(user, Utc::now());
        self.update(user).await
    }

    fn record_access_failure(&self, user: &mut User, now: DateTime<Utc>) {
        if !user.lockout_enabled {
            return;
        }
        user.access_failed_count += 1;
        if user.access_failed_count >= self.config.max_failed_access_attempts {
            let duration = chrono::Duration::from_std(self.config.lockout_duration)
                .unwrap_or_else(|_| chrono::Duration::minutes(5));
            user.lockout_end = Some(now + duration);
            user.access_failed_count = 0;
            tracing::warn!(user_id = %user.id, "User account locked out");
        }
    }

    pub async fn reset_access_failed_count(&self, user: &mut User) -> IdentityResult<()> {
        if user.access_failed_count == 0 {
            return Ok(());
        }
        user.access_failed_count = 0;
        self.update(user).await
    }

    // ========================================================================
    // Roles, claims, personal data
    // ========================================================================

    pub async fn get_roles(&self, user: &User) -> IdentityResult<Vec<String>> {
        Ok(self
            .store
            .find_user_roles(&user.id)
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect())
    }

    /// User claims followed by the claims of each role.
    pub async fn get_claims(&self, user: &User) -> IdentityResult<Vec<(String, String)>> {
        let mut claims: Vec<(String, String)> = self
            .store
            .find_claims(&user.id)
            .await?
            .into_iter()
            .map(|c| (c.claim_type, c.claim_value))
            .collect();
        for role in self.store.find_user_roles(&user.id).await? {
            claims.extend(
                self.store
                    .find_role_claims(&role.id)
                    .await?
                    .into_iter()
                    .map(|c| (c.claim_type, c.claim_value)),
            );
        }
        Ok(claims)
    }

    pub async fn add_claim(&self, user: &User, claim_type: &str, claim_value: &str) -> IdentityResult<()> {
        self.store
            .add_claim(&UserClaim::new(user.id, claim_type, claim_value))
            .await
    }

    /// Everything downloadable as `PersonalData.json`.
    pub async fn personal_data(&self, user: &User) -> IdentityResult<Map<String, Value>> {
        let mut data = match serde_json::to_value(user.personal_data()) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(IdentityError::Internal(e.to_string())),
        };
        for login in self.get_logins(user).await? {
            data.insert(
                format!("{} external login provider key", login.login_provider),
                Value::String(login.provider_key),
            );
        }
        if let Some(key) = self.get_authenticator_key(user).await? {
            data.insert("Authenticator Key".to_string(), Value::String(key.as_str().to_string()));
        }
        Ok(data)
    }
}
