use crate::domain::value_object::UserId;

/// Extra claim attached to a user's principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserClaim {
    pub id: i32,
    pub user_id: UserId,
    pub claim_type: String,
    pub claim_value: String,
}

impl UserClaim {
    /// Not yet stored; the store assigns `id`.
    pub fn new(user_id: UserId, claim_type: impl Into<String>, claim_value: impl Into<String>) -> Self {
        Self {
            id: 0,
            user_id,
            claim_type: claim_type.into(),
            claim_value: claim_value.into(),
        }
    }
}
