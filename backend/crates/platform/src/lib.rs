//! Platform crate - technical building blocks with no identity semantics.
//!
//! - Cookie headers (building, deleting, reading, collecting on a response)
//! - Crypto helpers (HMAC-SHA256, base64url, hex stamps, constant-time compare)
//! - Ticket protection (signed, purpose-bound, expiring payloads)
//! - Password policy and Argon2id hashing

pub mod cookie;
pub mod crypto;
pub mod password;
pub mod protector;
