//! Presentation Layer
//!
//! HTTP handlers, response bodies, router, and middleware.

pub mod dto;
pub mod extractor;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::IdentityAppState;
pub use middleware::{authenticate, require_authenticated};
pub use router::identity_router;
