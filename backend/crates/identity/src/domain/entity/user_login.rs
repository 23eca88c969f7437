use serde::Serialize;

use crate::domain::value_object::UserId;

/// An external provider identity linked to a user.
///
/// `(login_provider, provider_key)` is unique across all users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLogin {
    pub login_provider: String,
    pub provider_key: String,
    pub provider_display_name: Option<String>,
    #[serde(skip)]
    pub user_id: UserId,
}
