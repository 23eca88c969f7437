//! Store Traits
//!
//! Persistence interfaces. Implementations live in `infra/`.
//!
//! Only the `Send` variants (`UserStore`, ...) should be imported by
//! callers; the `Local*` traits exist for the macro.

use crate::domain::entity::{Role, RoleClaim, User, UserClaim, UserLogin, UserToken};
use crate::domain::value_object::{RoleId, UserId};
use crate::error::IdentityResult;

#[trait_variant::make(UserStore: Send)]
pub trait LocalUserStore {
    async fn create_user(&self, user: &User) -> IdentityResult<()>;

    /// Write `user` only if the stored concurrency stamp still equals
    /// `expected_stamp`. Returns `false` when someone else won the race.
    async fn update_user(&self, user: &User, expected_stamp: &str) -> IdentityResult<bool>;

    /// Removes the user and every record keyed by the user id.
    async fn delete_user(&self, user_id: &UserId) -> IdentityResult<bool>;

    async fn find_user_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>>;

    async fn find_user_by_name(&self, normalized_user_name: &str) -> IdentityResult<Option<User>>;

    async fn find_user_by_email(&self, normalized_email: &str) -> IdentityResult<Option<User>>;
}

#[trait_variant::make(UserLoginStore: Send)]
pub trait LocalUserLoginStore {
    async fn add_login(&self, login: &UserLogin) -> IdentityResult<()>;

    async fn remove_login(
        &self,
        user_id: &UserId,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<bool>;

    async fn find_logins(&self, user_id: &UserId) -> IdentityResult<Vec<UserLogin>>;

    async fn find_user_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<Option<User>>;
}

#[trait_variant::make(UserTokenStore: Send)]
pub trait LocalUserTokenStore {
    async fn find_token(
        &self,
        user_id: &UserId,
        login_provider: &str,
        name: &str,
    ) -> IdentityResult<Option<String>>;

    /// Insert or replace.
    async fn set_token(&self, token: &UserToken) -> IdentityResult<()>;

    async fn remove_token(
        &self,
        user_id: &UserId,
        login_provider: &str,
        name: &str,
    ) -> IdentityResult<()>;
}

#[trait_variant::make(UserClaimStore: Send)]
pub trait LocalUserClaimStore {
    async fn find_claims(&self, user_id: &UserId) -> IdentityResult<Vec<UserClaim>>;

    async fn add_claim(&self, claim: &UserClaim) -> IdentityResult<()>;
}

#[trait_variant::make(RoleStore: Send)]
pub trait LocalRoleStore {
    async fn create_role(&self, role: &Role) -> IdentityResult<()>;

    async fn find_role_by_name(&self, normalized_name: &str) -> IdentityResult<Option<Role>>;

    async fn add_user_to_role(&self, user_id: &UserId, role_id: &RoleId) -> IdentityResult<()>;

    async fn find_user_roles(&self, user_id: &UserId) -> IdentityResult<Vec<Role>>;

    async fn find_role_claims(&self, role_id: &RoleId) -> IdentityResult<Vec<RoleClaim>>;
}

/// Optional store features, asked synchronously.
pub trait StoreCapabilities {
    /// Whether users carry a security stamp that revalidation can compare.
    fn supports_security_stamp(&self) -> bool {
        true
    }
}

/// Everything the identity managers need from persistence.
pub trait IdentityStore:
    UserStore
    + UserLoginStore
    + UserTokenStore
    + UserClaimStore
    + RoleStore
    + StoreCapabilities
    + Clone
    + Send
    + Sync
    + 'static
{
}

impl<T> IdentityStore for T where
    T: UserStore
        + UserLoginStore
        + UserTokenStore
        + UserClaimStore
        + RoleStore
        + StoreCapabilities
        + Clone
        + Send
        + Sync
        + 'static
{
}
