//! User Accessor
//!
//! Resolves the user behind the request principal. A principal without a
//! backing user never yields a user: the caller gets a redirect to the
//! invalid-user page instead.

use crate::application::context::RequestContext;
use crate::application::user_manager::UserManager;
use crate::domain::entity::User;
use crate::domain::repository::IdentityStore;
use crate::error::IdentityResult;
use crate::navigation::routes::accounts;
use crate::navigation::{Redirect, RedirectManager};

#[derive(Debug)]
pub enum UserResolution {
    Resolved(User),
    Unavailable(Redirect),
}

pub struct UserAccessor<S>
where
    S: IdentityStore,
{
    users: UserManager<S>,
    redirects: RedirectManager,
}

impl<S> Clone for UserAccessor<S>
where
    S: IdentityStore,
{
    fn clone(&self) -> Self {
        Self {
            users: self.users.clone(),
            redirects: self.redirects.clone(),
        }
    }
}

impl<S> UserAccessor<S>
where
    S: IdentityStore,
{
    pub fn new(users: UserManager<S>, redirects: RedirectManager) -> Self {
        Self { users, redirects }
    }

    pub async fn resolve(&self, ctx: &RequestContext) -> IdentityResult<UserResolution> {
        let user = match ctx.user_id() {
            Some(user_id) => self.users.find_by_id(&user_id).await?,
            None => None,
        };

        Ok(match user {
            Some(user) => UserResolution::Resolved(user),
            None => {
                let user_id = ctx.user_id().map(|id| id.to_string()).unwrap_or_default();
                tracing::warn!(user_id = %user_id, "Could not retrieve user from the request principal");
                UserResolution::Unavailable(self.redirects.redirect_with_status(
                    accounts::INVALID_USER,
                    format!("Error: Unable to load user with ID '{user_id}'."),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::Method;
    use url::Url;

    use super::*;
    use crate::application::config::IdentityConfig;
    use crate::application::principal::Principal;
    use crate::domain::value_object::{Email, UserId};
    use crate::infra::memory::InMemoryIdentityStore;
    use crate::navigation::StatusMessageCookie;

    fn accessor() -> (UserAccessor<InMemoryIdentityStore>, UserManager<InMemoryIdentityStore>) {
        let config = IdentityConfig::development(Url::parse("http://localhost/").unwrap());
        let users = UserManager::new(Arc::new(InMemoryIdentityStore::new()), Arc::new(config));
        let redirects = RedirectManager::new(
            Url::parse("http://localhost/").unwrap(),
            StatusMessageCookie::new(false),
        );
        (UserAccessor::new(users.clone(), redirects), users)
    }

    fn principal_for(user_id: UserId) -> Principal {
        Principal {
            user_id,
            user_name: "alice@example.com".into(),
            email: None,
            security_stamp: None,
            roles: Vec::new(),
            claims: Vec::new(),
            authentication_method: "pwd".into(),
            is_persistent: false,
            issued_at_ms: 0,
            validated_at_ms: 0,
            expires_at_ms: i64::MAX,
        }
    }

    #[tokio::test]
    async fn test_resolves_existing_user() {
        let (accessor, users) = accessor();
        let user = users
            .create(User::new(Email::new("alice@example.com").unwrap()), None)
            .await
            .unwrap();
        let ctx = RequestContext::new(Method::GET, "/accounts/manage")
            .with_principal(Some(principal_for(user.id)));

        match accessor.resolve(&ctx).await.unwrap() {
            UserResolution::Resolved(found) => assert_eq!(found.id, user.id),
            UserResolution::Unavailable(_) => panic!("expected a user"),
        }
    }

    #[tokio::test]
    async fn test_missing_user_redirects_to_invalid_user() {
        let (accessor, _) = accessor();
        let ghost = UserId::new();
        let ctx = RequestContext::new(Method::GET, "/accounts/manage")
            .with_principal(Some(principal_for(ghost)));

        let UserResolution::Unavailable(redirect) = accessor.resolve(&ctx).await.unwrap() else {
            panic!("expected a redirect");
        };
        assert_eq!(redirect.location(), accounts::INVALID_USER);
        assert_eq!(
            redirect.status_message(),
            Some(format!("Error: Unable to load user with ID '{ghost}'.").as_str())
        );
    }

    #[tokio::test]
    async fn test_anonymous_request_redirects() {
        let (accessor, _) = accessor();
        let ctx = RequestContext::new(Method::GET, "/accounts/manage");
        assert!(matches!(
            accessor.resolve(&ctx).await.unwrap(),
            UserResolution::Unavailable(_)
        ));
    }
}
