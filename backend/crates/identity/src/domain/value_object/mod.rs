//! Value Object Module

pub mod authenticator_key;
pub mod email;
pub mod lookup;
pub mod phone_number;
pub mod recovery_codes;
pub mod security_stamp;

pub use authenticator_key::AuthenticatorKey;
pub use email::Email;
pub use kernel::id::{RoleId, UserId};
pub use lookup::normalize_key;
pub use recovery_codes::RecoveryCodeSet;
pub use security_stamp::{ConcurrencyStamp, SecurityStamp};
