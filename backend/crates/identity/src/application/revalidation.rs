//! Revalidating Authentication State Provider
//!
//! A signed-in principal is trusted for `revalidation_interval`; after that
//! it is checked against a fresh read of the store. Checks, in order:
//! missing user is invalid, a store without security stamps is valid,
//! otherwise the stamps must be equal (ordinal). No retries.

use std::sync::Arc;

use crate::application::config::{IdentityConfig, millis};
use crate::application::principal::Principal;
use crate::application::user_manager::UserManager;
use crate::domain::repository::IdentityStore;

pub struct RevalidatingAuthenticationStateProvider<S>
where
    S: IdentityStore,
{
    store: Arc<S>,
    config: Arc<IdentityConfig>,
}

impl<S> Clone for RevalidatingAuthenticationStateProvider<S>
where
    S: IdentityStore,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S> RevalidatingAuthenticationStateProvider<S>
where
    S: IdentityStore,
{
    pub fn new(store: Arc<S>, config: Arc<IdentityConfig>) -> Self {
        Self { store, config }
    }

    pub fn revalidation_interval_ms(&self) -> i64 {
        millis(self.config.revalidation_interval)
    }

    pub fn needs_revalidation(&self, principal: &Principal, now_ms: i64) -> bool {
        principal.needs_revalidation(now_ms, self.revalidation_interval_ms())
    }

    pub async fn validate_authentication_state(&self, principal: &Principal) -> bool {
        // Fresh manager per pass: nothing read here outlives the check.
        let users = UserManager::new(self.store.clone(), self.config.clone());

        let user = match users.find_by_id(&principal.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                tracing::warn!(user_id = %principal.user_id, "Revalidation failed: user no longer exists");
                return false;
            }
            Err(e) => {
                tracing::error!(user_id = %principal.user_id, error = %e, "Revalidation failed: store error");
                return false;
            }
        };

        if !users.supports_security_stamp() {
            return true;
        }

        let valid = principal.security_stamp.as_deref() == Some(user.security_stamp.as_str());
        if !valid {
            tracing::warn!(user_id = %principal.user_id, "Revalidation failed: security stamp changed");
        }
        valid
    }

    /// `Some` with the validation time slid forward, or `None` when the
    /// principal must be signed out.
    pub async fn revalidate(&self, principal: &Principal, now_ms: i64) -> Option<Principal> {
        if !self.validate_authentication_state(principal).await {
            return None;
        }
        let mut refreshed = principal.clone();
        refreshed.validated_at_ms = now_ms;
        refreshed.expires_at_ms = now_ms.saturating_add(millis(self.config.application_cookie_ttl));
        Some(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::domain::entity::User;
    use crate::domain::repository::UserStore;
    use crate::domain::value_object::{Email, SecurityStamp, UserId};
    use crate::infra::memory::InMemoryIdentityStore;

    fn config() -> Arc<IdentityConfig> {
        Arc::new(IdentityConfig::development(Url::parse("http://localhost/").unwrap()))
    }

    fn principal(user: &User, stamp: &str) -> Principal {
        Principal {
            user_id: user.id,
            user_name: user.user_name.clone(),
            email: None,
            security_stamp: Some(stamp.to_string()),
            roles: Vec::new(),
            claims: Vec::new(),
            authentication_method: "pwd".into(),
            is_persistent: true,
            issued_at_ms: 0,
            validated_at_ms: 0,
            expires_at_ms: 1_000,
        }
    }

    async fn store_with_stamp(store: &InMemoryIdentityStore, stamp: &str) -> User {
        let mut user = User::new(Email::new("alice@example.com").unwrap());
        user.security_stamp = SecurityStamp::from_db(stamp);
        store.create_user(&user).await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_matching_stamp_is_valid() {
        let store = InMemoryIdentityStore::new();
        let user = store_with_stamp(&store, "S1").await;
        let provider = RevalidatingAuthenticationStateProvider::new(Arc::new(store), config());
        assert!(provider.validate_authentication_state(&principal(&user, "S1")).await);
    }

    #[tokio::test]
    async fn test_rotated_stamp_is_invalid() {
        let store = InMemoryIdentityStore::new();
        let user = store_with_stamp(&store, "S2").await;
        let provider = RevalidatingAuthenticationStateProvider::new(Arc::new(store), config());
        assert!(!provider.validate_authentication_state(&principal(&user, "S1")).await);
        assert!(provider.revalidate(&principal(&user, "S1"), 5_000).await.is_none());
    }

    #[tokio::test]
    async fn test_stamp_comparison_is_ordinal() {
        let store = InMemoryIdentityStore::new();
        let user = store_with_stamp(&store, "ABC").await;
        let provider = RevalidatingAuthenticationStateProvider::new(Arc::new(store), config());
        assert!(!provider.validate_authentication_state(&principal(&user, "abc")).await);
    }

    #[tokio::test]
    async fn test_missing_user_is_invalid() {
        let provider =
            RevalidatingAuthenticationStateProvider::new(Arc::new(InMemoryIdentityStore::new()), config());
        let mut ghost = User::new(Email::new("ghost@example.com").unwrap());
        ghost.id = UserId::new();
        assert!(!provider.validate_authentication_state(&principal(&ghost, "S1")).await);
    }

    #[tokio::test]
    async fn test_store_without_stamps_is_valid() {
        let store = InMemoryIdentityStore::without_security_stamps();
        let user = store_with_stamp(&store, "S2").await;
        let provider = RevalidatingAuthenticationStateProvider::new(Arc::new(store), config());
        assert!(provider.validate_authentication_state(&principal(&user, "S1")).await);
    }

    #[tokio::test]
    async fn test_revalidate_slides_validation_time() {
        let store = InMemoryIdentityStore::new();
        let user = store_with_stamp(&store, "S1").await;
        let config = config();
        let ttl = millis(config.application_cookie_ttl);
        let provider = RevalidatingAuthenticationStateProvider::new(Arc::new(store), config);

        let p = principal(&user, "S1");
        assert!(!provider.needs_revalidation(&p, 1_000));
        assert!(provider.needs_revalidation(&p, provider.revalidation_interval_ms()));

        let refreshed = provider.revalidate(&p, 5_000).await.unwrap();
        assert_eq!(refreshed.validated_at_ms, 5_000);
        assert_eq!(refreshed.expires_at_ms, 5_000 + ttl);
    }
}
