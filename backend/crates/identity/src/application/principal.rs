//! Identity Principal
//!
//! The claim set of a signed-in user, carried in the application cookie as
//! a protected ticket.

use serde::{Deserialize, Serialize};

use crate::domain::value_object::UserId;

/// Ticket purpose of the application cookie.
pub const APPLICATION_PURPOSE: &str = "Identity.Application";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: UserId,
    pub user_name: String,
    pub email: Option<String>,
    /// Absent when the store has no security stamps.
    pub security_stamp: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub claims: Vec<(String, String)>,
    /// `pwd`, `mfa`, or the external provider name.
    pub authentication_method: String,
    pub is_persistent: bool,
    pub issued_at_ms: i64,
    pub validated_at_ms: i64,
    pub expires_at_ms: i64,
}

impl Principal {
    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn find_claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(t, _)| t == claim_type)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }

    /// True once `interval_ms` has passed since the last validation.
    pub fn needs_revalidation(&self, now_ms: i64, interval_ms: i64) -> bool {
        now_ms - self.validated_at_ms >= interval_ms
    }
}
