//! Identity Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, store traits
//! - `application/` - Managers, page flows and account endpoints
//! - `navigation/` - Fixed routes, redirects, one-time status messages
//! - `infra/` - PostgreSQL and in-memory stores
//! - `presentation/` - HTTP handlers, middleware, router
//!
//! ## Features
//! - Email + password sign-up and sign-in with email confirmation
//! - TOTP authenticator 2FA with recovery codes and remembered browsers
//! - External OAuth2 logins (sign-in, account creation, linking)
//! - Account management: profile, email change, passwords, personal data
//!
//! ## Security Model
//! - Passwords hashed with Argon2id
//! - Signed, purpose-bound cookie tickets and emailed tokens
//! - Security stamp revalidation of signed-in principals every 30 minutes
//! - Redirect targets are always reduced to same-origin paths
//! - Lockout after repeated failed attempts

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod navigation;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::IdentityConfig;
pub use application::services::IdentityServices;
pub use error::{IdentityError, IdentityFailure, IdentityFailures, IdentityResult};
pub use infra::memory::InMemoryIdentityStore;
pub use infra::postgres::PgIdentityStore;
pub use presentation::router::identity_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
