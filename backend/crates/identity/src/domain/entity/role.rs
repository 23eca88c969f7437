//! Roles and the records scoped to them.

use crate::domain::value_object::{ConcurrencyStamp, RoleId, UserId, normalize_key};

#[derive(Debug, Clone)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub normalized_name: String,
    pub concurrency_stamp: ConcurrencyStamp,
}

impl Role {
    pub fn new(name: &str) -> Self {
        Self {
            id: RoleId::new(),
            name: name.to_string(),
            normalized_name: normalize_key(name),
            concurrency_stamp: ConcurrencyStamp::generate(),
        }
    }
}

/// Membership of a user in a role. Both sides are ids; resolve with the
/// stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserRole {
    pub user_id: UserId,
    pub role_id: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleClaim {
    pub id: i32,
    pub role_id: RoleId,
    pub claim_type: String,
    pub claim_value: String,
}
