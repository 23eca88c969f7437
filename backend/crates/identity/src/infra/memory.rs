//! In-memory identity store.
//!
//! Same contract as the PostgreSQL store, including the concurrency-stamp
//! check and login uniqueness. Used by tests and local runs without a
//! database.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::entity::{Role, RoleClaim, User, UserClaim, UserLogin, UserRole, UserToken};
use crate::domain::repository::{
    RoleStore, StoreCapabilities, UserClaimStore, UserLoginStore, UserStore, UserTokenStore,
};
use crate::domain::value_object::{RoleId, UserId};
use crate::error::{IdentityError, IdentityFailure, IdentityResult};

type TokenKey = (UserId, String, String);

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    logins: Vec<UserLogin>,
    tokens: HashMap<TokenKey, String>,
    claims: Vec<UserClaim>,
    roles: HashMap<RoleId, Role>,
    user_roles: HashSet<UserRole>,
    role_claims: Vec<RoleClaim>,
    next_claim_id: i32,
}

#[derive(Clone)]
pub struct InMemoryIdentityStore {
    state: Arc<RwLock<State>>,
    security_stamps: bool,
}

impl Default for InMemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
            security_stamps: true,
        }
    }

    /// A store that reports no security stamp support.
    pub fn without_security_stamps() -> Self {
        Self {
            security_stamps: false,
            ..Self::new()
        }
    }

    pub async fn add_role_claim(&self, role_id: &RoleId, claim_type: &str, claim_value: &str) {
        let mut state = self.state.write().await;
        state.next_claim_id += 1;
        let id = state.next_claim_id;
        state.role_claims.push(RoleClaim {
            id,
            role_id: *role_id,
            claim_type: claim_type.to_string(),
            claim_value: claim_value.to_string(),
        });
    }
}

impl StoreCapabilities for InMemoryIdentityStore {
    fn supports_security_stamp(&self) -> bool {
        self.security_stamps
    }
}

// ============================================================================
// Users
// ============================================================================

impl UserStore for InMemoryIdentityStore {
    async fn create_user(&self, user: &User) -> IdentityResult<()> {
        let mut state = self.state.write().await;
        if state
            .users
            .values()
            .any(|u| u.normalized_user_name == user.normalized_user_name)
        {
            return Err(IdentityError::rejected(IdentityFailure::duplicate_user_name(
                &user.user_name,
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User, expected_stamp: &str) -> IdentityResult<bool> {
        let mut state = self.state.write().await;
        match state.users.get_mut(&user.id) {
            Some(stored) if stored.concurrency_stamp.as_str() == expected_stamp => {
                *stored = user.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_user(&self, user_id: &UserId) -> IdentityResult<bool> {
        let mut state = self.state.write().await;
        let removed = state.users.remove(user_id).is_some();
        state.logins.retain(|l| l.user_id != *user_id);
        state.tokens.retain(|(id, _, _), _| id != user_id);
        state.claims.retain(|c| c.user_id != *user_id);
        state.user_roles.retain(|r| r.user_id != *user_id);
        Ok(removed)
    }

    async fn find_user_by_id(&self, user_id: &UserId) -> IdentityResult<Option<User>> {
        Ok(self.state.read().await.users.get(user_id).cloned())
    }

    async fn find_user_by_name(&self, normalized_user_name: &str) -> IdentityResult<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.normalized_user_name == normalized_user_name)
            .cloned())
    }

    async fn find_user_by_email(&self, normalized_email: &str) -> IdentityResult<Option<User>> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.normalized_email.as_deref() == Some(normalized_email))
            .cloned())
    }
}

// ============================================================================
// Logins, tokens, claims
// ============================================================================

impl UserLoginStore for InMemoryIdentityStore {
    async fn add_login(&self, login: &UserLogin) -> IdentityResult<()> {
        let mut state = self.state.write().await;
        if state.logins.iter().any(|l| {
            l.login_provider == login.login_provider && l.provider_key == login.provider_key
        }) {
            return Err(IdentityError::rejected(IdentityFailure::login_already_associated()));
        }
        state.logins.push(login.clone());
        Ok(())
    }

    async fn remove_login(
        &self,
        user_id: &UserId,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<bool> {
        let mut state = self.state.write().await;
        let before = state.logins.len();
        state.logins.retain(|l| {
            !(l.user_id == *user_id
                && l.login_provider == login_provider
                && l.provider_key == provider_key)
        });
        Ok(state.logins.len() != before)
    }

    async fn find_logins(&self, user_id: &UserId) -> IdentityResult<Vec<UserLogin>> {
        Ok(self
            .state
            .read()
            .await
            .logins
            .iter()
            .filter(|l| l.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn find_user_by_login(
        &self,
        login_provider: &str,
        provider_key: &str,
    ) -> IdentityResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .logins
            .iter()
            .find(|l| l.login_provider == login_provider && l.provider_key == provider_key)
            .and_then(|l| state.users.get(&l.user_id))
            .cloned())
    }
}

impl UserTokenStore for InMemoryIdentityStore {
    async fn find_token(
        &self,
        user_id: &UserId,
        login_provider: &str,
        name: &str,
    ) -> IdentityResult<Option<String>> {
        let key = (*user_id, login_provider.to_string(), name.to_string());
        Ok(self.state.read().await.tokens.get(&key).cloned())
    }

    async fn set_token(&self, token: &UserToken) -> IdentityResult<()> {
        let key = (token.user_id, token.login_provider.clone(), token.name.clone());
        self.state.write().await.tokens.insert(key, token.value.clone());
        Ok(())
    }

    async fn remove_token(
        &self,
        user_id: &UserId,
        login_provider: &str,
        name: &str,
    ) -> IdentityResult<()> {
        let key = (*user_id, login_provider.to_string(), name.to_string());
        self.state.write().await.tokens.remove(&key);
        Ok(())
    }
}

impl UserClaimStore for InMemoryIdentityStore {
    async fn find_claims(&self, user_id: &UserId) -> IdentityResult<Vec<UserClaim>> {
        Ok(self
            .state
            .read()
            .await
            .claims
            .iter()
            .filter(|c| c.user_id == *user_id)
            .cloned()
            .collect())
    }

    async fn add_claim(&self, claim: &UserClaim) -> IdentityResult<()> {
        let mut state = self.state.write().await;
        state.next_claim_id += 1;
        let id = state.next_claim_id;
        state.claims.push(UserClaim {
            id,
            ..claim.clone()
        });
        Ok(())
    }
}

// ============================================================================
// Roles
// ============================================================================

impl RoleStore for InMemoryIdentityStore {
    async fn create_role(&self, role: &Role) -> IdentityResult<()> {
        let mut state = self.state.write().await;
        if state
            .roles
            .values()
            .any(|r| r.normalized_name == role.normalized_name)
        {
            return Err(IdentityError::rejected(IdentityFailure::duplicate_role_name(
                &role.name,
            )));
        }
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn find_role_by_name(&self, normalized_name: &str) -> IdentityResult<Option<Role>> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .values()
            .find(|r| r.normalized_name == normalized_name)
            .cloned())
    }

    async fn add_user_to_role(&self, user_id: &UserId, role_id: &RoleId) -> IdentityResult<()> {
        let mut state = self.state.write().await;
        let membership = UserRole {
            user_id: *user_id,
            role_id: *role_id,
        };
        if !state.user_roles.insert(membership) {
            let name = state
                .roles
                .get(role_id)
                .map(|r| r.name.clone())
                .unwrap_or_default();
            return Err(IdentityError::rejected(IdentityFailure::user_already_in_role(
                &name,
            )));
        }
        Ok(())
    }

    async fn find_user_roles(&self, user_id: &UserId) -> IdentityResult<Vec<Role>> {
        let state = self.state.read().await;
        let mut roles: Vec<Role> = state
            .user_roles
            .iter()
            .filter(|m| m.user_id == *user_id)
            .filter_map(|m| state.roles.get(&m.role_id).cloned())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role_claims(&self, role_id: &RoleId) -> IdentityResult<Vec<RoleClaim>> {
        Ok(self
            .state
            .read()
            .await
            .role_claims
            .iter()
            .filter(|c| c.role_id == *role_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::Email;

    #[tokio::test]
    async fn test_update_requires_matching_stamp() {
        let store = InMemoryIdentityStore::new();
        let user = User::new(Email::new("alice@example.com").unwrap());
        store.create_user(&user).await.unwrap();

        assert!(!store.update_user(&user, "stale").await.unwrap());
        assert!(
            store
                .update_user(&user, user.concurrency_stamp.as_str())
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let store = InMemoryIdentityStore::new();
        let user = User::new(Email::new("alice@example.com").unwrap());
        store.create_user(&user).await.unwrap();
        store
            .set_token(&UserToken::internal(user.id, "RecoveryCodes", "x"))
            .await
            .unwrap();
        store
            .add_claim(&UserClaim::new(user.id, "given_name", "Alice"))
            .await
            .unwrap();

        assert!(store.delete_user(&user.id).await.unwrap());
        assert!(store.find_claims(&user.id).await.unwrap().is_empty());
        assert_eq!(
            store
                .find_token(&user.id, crate::domain::entity::user_token::INTERNAL_LOGIN_PROVIDER, "RecoveryCodes")
                .await
                .unwrap(),
            None
        );
        assert!(!store.delete_user(&user.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_roles_and_role_claims() {
        let store = InMemoryIdentityStore::new();
        let user = User::new(Email::new("alice@example.com").unwrap());
        store.create_user(&user).await.unwrap();
        let role = Role::new("Admin");
        store.create_role(&role).await.unwrap();
        assert!(store.create_role(&Role::new("admin")).await.is_err());

        store.add_user_to_role(&user.id, &role.id).await.unwrap();
        assert!(store.add_user_to_role(&user.id, &role.id).await.is_err());
        store.add_role_claim(&role.id, "permission", "users.manage").await;

        let roles = store.find_user_roles(&user.id).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(store.find_role_claims(&role.id).await.unwrap().len(), 1);
        assert!(store.find_role_by_name("ADMIN").await.unwrap().is_some());
    }

    #[test]
    fn test_security_stamp_capability() {
        assert!(InMemoryIdentityStore::new().supports_security_stamp());
        assert!(!InMemoryIdentityStore::without_security_stamps().supports_security_stamp());
    }
}
