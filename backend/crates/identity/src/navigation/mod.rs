//! Navigation: fixed routes, redirects and one-time status messages.

pub mod redirect;
pub mod routes;
pub mod status_message;

pub use redirect::{Redirect, RedirectManager};
pub use status_message::{STATUS_COOKIE_NAME, StatusMessageCookie};
