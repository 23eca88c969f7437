//! User Entity

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::value_object::{
    ConcurrencyStamp, Email, SecurityStamp, UserId, normalize_key,
};

/// A registered account.
///
/// The user name is the email address the account signed up with.
/// Claims, roles, logins and tokens are separate records keyed by `id`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub user_name: String,
    pub normalized_user_name: String,
    pub email: Option<Email>,
    pub normalized_email: Option<String>,
    pub email_confirmed: bool,
    /// Argon2id PHC string; `None` for accounts created from an external login.
    pub password_hash: Option<String>,
    pub security_stamp: SecurityStamp,
    pub concurrency_stamp: ConcurrencyStamp,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub lockout_enabled: bool,
    pub access_failed_count: i32,
}

impl User {
    pub fn new(email: Email) -> Self {
        let user_name = email.as_str().to_string();
        Self {
            id: UserId::new(),
            normalized_user_name: normalize_key(&user_name),
            user_name,
            normalized_email: Some(email.normalized()),
            email: Some(email),
            email_confirmed: false,
            password_hash: None,
            security_stamp: SecurityStamp::generate(),
            concurrency_stamp: ConcurrencyStamp::generate(),
            phone_number: None,
            phone_number_confirmed: false,
            two_factor_enabled: false,
            lockout_end: None,
            lockout_enabled: true,
            access_failed_count: 0,
        }
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn email_str(&self) -> &str {
        self.email.as_ref().map(Email::as_str).unwrap_or_default()
    }

    pub fn set_user_name(&mut self, user_name: &str) {
        self.user_name = user_name.to_string();
        self.normalized_user_name = normalize_key(user_name);
    }

    pub fn set_email(&mut self, email: Option<Email>) {
        self.normalized_email = email.as_ref().map(Email::normalized);
        self.email = email;
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_enabled && self.lockout_end.is_some_and(|end| end > now)
    }

    pub fn rotate_security_stamp(&mut self) {
        self.security_stamp = SecurityStamp::generate();
    }

    /// Fields exported by the personal data download.
    pub fn personal_data(&self) -> PersonalData {
        PersonalData {
            id: self.id.to_string(),
            user_name: self.user_name.clone(),
            email: self.email.as_ref().map(|e| e.as_str().to_string()),
            email_confirmed: self.email_confirmed,
            phone_number: self.phone_number.clone(),
            phone_number_confirmed: self.phone_number_confirmed,
            two_factor_enabled: self.two_factor_enabled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PersonalData {
    pub id: String,
    pub user_name: String,
    pub email: Option<String>,
    pub email_confirmed: bool,
    pub phone_number: Option<String>,
    pub phone_number_confirmed: bool,
    pub two_factor_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        User::new(Email::new("Alice@example.com").unwrap())
    }

    #[test]
    fn test_new_user_uses_email_as_user_name() {
        let user = user();
        assert_eq!(user.user_name, "Alice@example.com");
        assert_eq!(user.normalized_user_name, "ALICE@EXAMPLE.COM");
        assert_eq!(user.normalized_email.as_deref(), Some("ALICE@EXAMPLE.COM"));
        assert!(!user.has_password());
        assert!(!user.email_confirmed);
    }

    #[test]
    fn test_lockout_window() {
        let mut user = user();
        let now = Utc::now();
        user.lockout_end = Some(now + Duration::minutes(5));
        assert!(user.is_locked_out(now));
        assert!(!user.is_locked_out(now + Duration::minutes(6)));

        user.lockout_enabled = false;
        assert!(!user.is_locked_out(now));
    }

    #[test]
    fn test_personal_data_keys() {
        let json = serde_json::to_value(user().personal_data()).unwrap();
        assert_eq!(json["UserName"], "Alice@example.com");
        assert!(json.get("PasswordHash").is_none());
    }
}
