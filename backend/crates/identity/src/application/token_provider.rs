//! Purpose tokens for emailed links.
//!
//! A token is a protected ticket carrying the user id and the security stamp
//! at the time it was issued. Any credential change rotates the stamp and
//! with it invalidates every outstanding token.

use std::time::Duration;

use chrono::{DateTime, Utc};
use platform::protector::TicketProtector;
use serde::{Deserialize, Serialize};

use crate::application::config::millis;
use crate::domain::entity::User;
use crate::error::IdentityResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPurpose {
    EmailConfirmation,
    /// Bound to the address being confirmed.
    ChangeEmail(String),
    ResetPassword,
}

impl TokenPurpose {
    fn as_purpose(&self) -> String {
        match self {
            TokenPurpose::EmailConfirmation => "Identity.Token:EmailConfirmation".to_string(),
            TokenPurpose::ChangeEmail(new_email) => {
                format!("Identity.Token:ChangeEmail:{}", new_email.trim().to_lowercase())
            }
            TokenPurpose::ResetPassword => "Identity.Token:ResetPassword".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct TokenPayload {
    uid: String,
    stamp: String,
}

#[derive(Debug, Clone)]
pub struct TokenProvider {
    protector: TicketProtector,
    lifespan: Duration,
}

impl TokenProvider {
    pub fn new(protector: TicketProtector, lifespan: Duration) -> Self {
        Self {
            protector,
            lifespan,
        }
    }

    pub fn generate(
        &self,
        user: &User,
        purpose: &TokenPurpose,
        now: DateTime<Utc>,
    ) -> IdentityResult<String> {
        let payload = TokenPayload {
            uid: user.id.to_string(),
            stamp: user.security_stamp.as_str().to_string(),
        };
        let expires_at = now.timestamp_millis().saturating_add(millis(self.lifespan));
        Ok(self
            .protector
            .protect(&purpose.as_purpose(), &payload, expires_at)?)
    }

    pub fn validate(
        &self,
        user: &User,
        purpose: &TokenPurpose,
        token: &str,
        now: DateTime<Utc>,
    ) -> bool {
        match self.protector.unprotect::<TokenPayload>(
            &purpose.as_purpose(),
            token.trim(),
            now.timestamp_millis(),
        ) {
            Ok(payload) => {
                payload.uid == user.id.to_string() && user.security_stamp.matches(&payload.stamp)
            }
            Err(e) => {
                tracing::debug!(user_id = %user.id, error = %e, "Purpose token rejected");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::Email;

    fn provider() -> TokenProvider {
        TokenProvider::new(TicketProtector::new([9u8; 32]), Duration::from_secs(3600))
    }

    fn user() -> User {
        User::new(Email::new("alice@example.com").unwrap())
    }

    #[test]
    fn test_token_valid_for_its_purpose_only() {
        let provider = provider();
        let user = user();
        let now = Utc::now();
        let token = provider
            .generate(&user, &TokenPurpose::EmailConfirmation, now)
            .unwrap();
        assert!(provider.validate(&user, &TokenPurpose::EmailConfirmation, &token, now));
        assert!(!provider.validate(&user, &TokenPurpose::ResetPassword, &token, now));
    }

    #[test]
    fn test_stamp_rotation_invalidates_token() {
        let provider = provider();
        let mut user = user();
        let now = Utc::now();
        let token = provider.generate(&user, &TokenPurpose::ResetPassword, now).unwrap();
        user.rotate_security_stamp();
        assert!(!provider.validate(&user, &TokenPurpose::ResetPassword, &token, now));
    }

    #[test]
    fn test_change_email_token_is_bound_to_address() {
        let provider = provider();
        let user = user();
        let now = Utc::now();
        let purpose = TokenPurpose::ChangeEmail("new@example.com".into());
        let token = provider.generate(&user, &purpose, now).unwrap();
        assert!(provider.validate(&user, &purpose, &token, now));
        assert!(!provider.validate(
            &user,
            &TokenPurpose::ChangeEmail("other@example.com".into()),
            &token,
            now
        ));
    }

    #[test]
    fn test_token_expires() {
        let provider = provider();
        let user = user();
        let now = Utc::now();
        let token = provider
            .generate(&user, &TokenPurpose::EmailConfirmation, now)
            .unwrap();
        let later = now + chrono::Duration::hours(2);
        assert!(!provider.validate(&user, &TokenPurpose::EmailConfirmation, &token, later));
    }

    #[test]
    fn test_other_user_cannot_use_token() {
        let provider = provider();
        let now = Utc::now();
        let token = provider
            .generate(&user(), &TokenPurpose::EmailConfirmation, now)
            .unwrap();
        assert!(!provider.validate(&user(), &TokenPurpose::EmailConfirmation, &token, now));
    }
}
