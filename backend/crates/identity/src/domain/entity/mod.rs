//! Entities
//!
//! Records reference each other by id only; there is no object graph.

pub mod role;
pub mod user;
pub mod user_claim;
pub mod user_login;
pub mod user_token;

pub use role::{Role, RoleClaim, UserRole};
pub use user::{PersonalData, User};
pub use user_claim::UserClaim;
pub use user_login::UserLogin;
pub use user_token::UserToken;
