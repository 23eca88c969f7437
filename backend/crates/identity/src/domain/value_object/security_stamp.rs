//! Security and concurrency stamps.

use derive_more::Display;
use platform::crypto::{random_bytes, to_hex_upper};
use serde::{Deserialize, Serialize};

/// Opaque value rotated whenever a user's credentials change.
///
/// Compared with ordinal (byte-for-byte) equality only.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityStamp(String);

impl SecurityStamp {
    pub fn generate() -> Self {
        Self(to_hex_upper(&random_bytes(20)))
    }

    pub fn from_db(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn matches(&self, claimed: &str) -> bool {
        self.0 == claimed
    }
}

/// Optimistic concurrency token; every successful update replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub struct ConcurrencyStamp(String);

impl ConcurrencyStamp {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn from_db(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
