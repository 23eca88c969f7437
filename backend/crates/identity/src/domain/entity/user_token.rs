use crate::domain::value_object::UserId;

/// Provider name for tokens the identity system keeps for itself.
pub const INTERNAL_LOGIN_PROVIDER: &str = "[AspNetUserStore]";
pub const AUTHENTICATOR_KEY_TOKEN: &str = "AuthenticatorKey";
pub const RECOVERY_CODES_TOKEN: &str = "RecoveryCodes";

/// Named value stored for a user, keyed by `(user_id, login_provider, name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken {
    pub user_id: UserId,
    pub login_provider: String,
    pub name: String,
    pub value: String,
}

impl UserToken {
    pub fn internal(user_id: UserId, name: &str, value: impl Into<String>) -> Self {
        Self {
            user_id,
            login_provider: INTERNAL_LOGIN_PROVIDER.to_string(),
            name: name.to_string(),
            value: value.into(),
        }
    }
}
