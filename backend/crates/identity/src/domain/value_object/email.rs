//! Email Value Object
//!
//! Syntax check only. Ownership is proven through the confirmation link.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::lookup::normalize_key;
use crate::error::{IdentityError, IdentityFailure};

/// Maximum email length (per RFC 5321)
const EMAIL_MAX_LENGTH: usize = 254;

/// Email address as the user typed it (trimmed). Lookups go through
/// [`Email::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn new(email: &str) -> Result<Self, IdentityError> {
        let email = email.trim();
        if Self::is_valid(email) {
            Ok(Self(email.to_string()))
        } else {
            Err(IdentityError::rejected(IdentityFailure::invalid_email(email)))
        }
    }

    pub fn is_valid(email: &str) -> bool {
        if email.is_empty() || email.len() > EMAIL_MAX_LENGTH {
            return false;
        }
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        if local.is_empty() || local.len() > 64 || domain.contains('@') {
            return false;
        }
        if email.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return false;
        }
        if domain.is_empty()
            || !domain.contains('.')
            || domain.starts_with(['.', '-'])
            || domain.ends_with(['.', '-'])
        {
            return false;
        }
        domain
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    }

    /// Stored value; assumed valid.
    pub fn from_db(email: impl Into<String>) -> Self {
        Self(email.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn normalized(&self) -> String {
        normalize_key(&self.0)
    }
}

impl FromStr for Email {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Email::new(s)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        for email in ["user@example.com", "first.last+tag@sub.example.co.jp", " padded@example.com "] {
            assert!(Email::new(email).is_ok(), "{email}");
        }
    }

    #[test]
    fn test_invalid_emails() {
        for email in [
            "",
            "plainaddress",
            "@example.com",
            "user@",
            "user@@example.com",
            "user@localhost",
            "user@-example.com",
            "user name@example.com",
        ] {
            assert!(!Email::is_valid(email), "{email}");
        }
    }

    #[test]
    fn test_case_is_kept_but_normalized_for_lookup() {
        let email = Email::new("Alice@Example.com").unwrap();
        assert_eq!(email.as_str(), "Alice@Example.com");
        assert_eq!(email.normalized(), "ALICE@EXAMPLE.COM");
    }

    #[test]
    fn test_rejection_carries_identity_code() {
        match Email::new("nope") {
            Err(IdentityError::Rejected(failures)) => assert!(failures.contains_code("InvalidEmail")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
