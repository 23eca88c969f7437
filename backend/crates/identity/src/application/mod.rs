//! Application layer: identity managers, page flows and endpoints.

pub mod accounts;
pub mod config;
pub mod context;
pub mod email_sender;
pub mod endpoints;
pub mod external;
pub mod flow;
pub mod manage;
pub mod principal;
pub mod revalidation;
pub mod services;
pub mod sign_in_manager;
pub mod token_provider;
pub mod user_accessor;
pub mod user_manager;
pub mod validation;

pub use config::IdentityConfig;
pub use context::RequestContext;
pub use email_sender::{EmailSender, NoOpEmailSender};
pub use external::{ExternalLoginInfo, ExternalProviders, OAuthProvider};
pub use flow::{Flow, Page};
pub use principal::Principal;
pub use services::IdentityServices;
pub use sign_in_manager::{SignInManager, SignInResult};
pub use user_manager::UserManager;
