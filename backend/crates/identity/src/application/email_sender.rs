//! Email Sender
//!
//! Outgoing account emails. Only the no-op sender ships; it logs instead of
//! sending and lets the sign-up confirmation page show the link.

use crate::domain::entity::User;
use crate::error::IdentityResult;

#[trait_variant::make(EmailSender: Send)]
pub trait LocalEmailSender {
    async fn send_confirmation_link(
        &self,
        user: &User,
        email: &str,
        confirmation_link: &str,
    ) -> IdentityResult<()>;

    async fn send_password_reset_link(
        &self,
        user: &User,
        email: &str,
        reset_link: &str,
    ) -> IdentityResult<()>;

    async fn send_password_reset_code(
        &self,
        user: &User,
        email: &str,
        reset_code: &str,
    ) -> IdentityResult<()>;

    /// Whether pages should show links this sender never delivers.
    fn displays_links(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEmailSender;

impl EmailSender for NoOpEmailSender {
    async fn send_confirmation_link(
        &self,
        user: &User,
        _email: &str,
        _confirmation_link: &str,
    ) -> IdentityResult<()> {
        tracing::debug!(user_id = %user.id, "Confirmation email not sent (no-op sender)");
        Ok(())
    }

    async fn send_password_reset_link(
        &self,
        user: &User,
        _email: &str,
        _reset_link: &str,
    ) -> IdentityResult<()> {
        tracing::debug!(user_id = %user.id, "Password reset email not sent (no-op sender)");
        Ok(())
    }

    async fn send_password_reset_code(
        &self,
        user: &User,
        _email: &str,
        _reset_code: &str,
    ) -> IdentityResult<()> {
        tracing::debug!(user_id = %user.id, "Password reset code not sent (no-op sender)");
        Ok(())
    }

    fn displays_links(&self) -> bool {
        true
    }
}
