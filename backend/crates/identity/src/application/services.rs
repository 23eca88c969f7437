//! Identity Services
//!
//! Everything a page flow needs, built once at startup and shared.

use std::sync::Arc;

use crate::application::config::IdentityConfig;
use crate::application::email_sender::EmailSender;
use crate::application::external::ExternalProviders;
use crate::application::revalidation::RevalidatingAuthenticationStateProvider;
use crate::application::sign_in_manager::SignInManager;
use crate::application::user_accessor::UserAccessor;
use crate::application::user_manager::UserManager;
use crate::domain::repository::IdentityStore;
use crate::navigation::{RedirectManager, StatusMessageCookie};

pub struct IdentityServices<S, E>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    pub config: Arc<IdentityConfig>,
    pub users: UserManager<S>,
    pub sign_in: SignInManager<S>,
    pub redirects: RedirectManager,
    pub accessor: UserAccessor<S>,
    pub revalidation: RevalidatingAuthenticationStateProvider<S>,
    pub email_sender: Arc<E>,
    pub providers: Arc<ExternalProviders>,
}

impl<S, E> IdentityServices<S, E>
where
    S: IdentityStore,
    E: EmailSender + Sync + 'static,
{
    pub fn new(
        store: S,
        config: IdentityConfig,
        email_sender: E,
        providers: ExternalProviders,
    ) -> Self {
        let store = Arc::new(store);
        let config = Arc::new(config);
        let users = UserManager::new(store.clone(), config.clone());
        let redirects = RedirectManager::new(
            config.base_uri.clone(),
            StatusMessageCookie::new(config.cookie_secure),
        );

        Self {
            sign_in: SignInManager::new(users.clone()),
            accessor: UserAccessor::new(users.clone(), redirects.clone()),
            revalidation: RevalidatingAuthenticationStateProvider::new(store, config.clone()),
            users,
            redirects,
            email_sender: Arc::new(email_sender),
            providers: Arc::new(providers),
            config,
        }
    }
}
