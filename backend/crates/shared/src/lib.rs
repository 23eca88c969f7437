//! Shared kernel for the Barebones backend.
//!
//! Only vocabulary that every other crate agrees on lives here:
//! - the HTTP-facing error type ([`error::app_error::AppError`]) and its [`error::kind::ErrorKind`]
//! - typed entity identifiers ([`id::Id`])

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
