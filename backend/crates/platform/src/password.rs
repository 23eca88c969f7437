//! Password policy and hashing.
//!
//! - [`PasswordPolicy`] checks composition rules and reports every rule a
//!   candidate breaks, not just the first.
//! - [`ClearTextPassword`] is NFKC-normalized and zeroized on drop.
//! - [`HashedPassword`] is an Argon2id PHC string, optionally peppered.

use std::collections::HashSet;
use std::fmt;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use rand::rngs::OsRng;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// Policy
// ============================================================================

/// Composition rules applied to new passwords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub required_length: usize,
    pub required_unique_chars: usize,
    pub require_non_alphanumeric: bool,
    pub require_lowercase: bool,
    pub require_uppercase: bool,
    pub require_digit: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            required_length: 6,
            required_unique_chars: 1,
            require_non_alphanumeric: true,
            require_lowercase: true,
            require_uppercase: true,
            require_digit: true,
        }
    }
}

/// One broken composition rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasswordViolation {
    #[error("Passwords must be at least {min} characters.")]
    TooShort { min: usize },
    #[error("Passwords must have at least one non alphanumeric character.")]
    RequiresNonAlphanumeric,
    #[error("Passwords must have at least one digit ('0'-'9').")]
    RequiresDigit,
    #[error("Passwords must have at least one lowercase ('a'-'z').")]
    RequiresLower,
    #[error("Passwords must have at least one uppercase ('A'-'Z').")]
    RequiresUpper,
    #[error("Passwords must use at least {min} different characters.")]
    RequiresUniqueChars { min: usize },
}

impl PasswordViolation {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            PasswordViolation::TooShort { .. } => "PasswordTooShort",
            PasswordViolation::RequiresNonAlphanumeric => "PasswordRequiresNonAlphanumeric",
            PasswordViolation::RequiresDigit => "PasswordRequiresDigit",
            PasswordViolation::RequiresLower => "PasswordRequiresLower",
            PasswordViolation::RequiresUpper => "PasswordRequiresUpper",
            PasswordViolation::RequiresUniqueChars { .. } => "PasswordRequiresUniqueChars",
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &ClearTextPassword) -> Result<(), Vec<PasswordViolation>> {
        let value = password.0.as_str();
        let mut violations = Vec::new();

        if value.trim().is_empty() || value.chars().count() < self.required_length {
            violations.push(PasswordViolation::TooShort {
                min: self.required_length,
            });
        }
        if self.require_non_alphanumeric && value.chars().all(|c| c.is_ascii_alphanumeric()) {
            violations.push(PasswordViolation::RequiresNonAlphanumeric);
        }
        if self.require_digit && !value.chars().any(|c| c.is_ascii_digit()) {
            violations.push(PasswordViolation::RequiresDigit);
        }
        if self.require_lowercase && !value.chars().any(|c| c.is_ascii_lowercase()) {
            violations.push(PasswordViolation::RequiresLower);
        }
        if self.require_uppercase && !value.chars().any(|c| c.is_ascii_uppercase()) {
            violations.push(PasswordViolation::RequiresUpper);
        }
        if self.required_unique_chars >= 1
            && value.chars().collect::<HashSet<_>>().len() < self.required_unique_chars
        {
            violations.push(PasswordViolation::RequiresUniqueChars {
                min: self.required_unique_chars,
            });
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[derive(Debug, Error)]
pub enum PasswordHashError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

// ============================================================================
// Clear text password (zeroized on drop)
// ============================================================================

/// A password as typed by the user.
///
/// Not `Clone`; `Debug` is redacted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ClearTextPassword(String);

impl ClearTextPassword {
    /// Normalizes with NFKC so visually identical input hashes identically.
    pub fn new(raw: &str) -> Self {
        Self(raw.nfkc().collect())
    }

    fn peppered(&self, pepper: Option<&[u8]>) -> Vec<u8> {
        let mut bytes = self.0.as_bytes().to_vec();
        if let Some(pepper) = pepper {
            bytes.extend_from_slice(pepper);
        }
        bytes
    }

    /// Argon2id with the crate defaults (m=19456, t=2, p=1) and a fresh salt.
    pub fn hash(&self, pepper: Option<&[u8]>) -> Result<HashedPassword, PasswordHashError> {
        let mut input = self.peppered(pepper);
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(&input, &salt)
            .map_err(|e| PasswordHashError::HashingFailed(e.to_string()));
        input.zeroize();

        Ok(HashedPassword {
            hash: hash?.to_string(),
        })
    }
}

impl fmt::Debug for ClearTextPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClearTextPassword")
            .field(&"[REDACTED]")
            .finish()
    }
}

// ============================================================================
// Hashed password (safe to store)
// ============================================================================

/// Argon2id hash in PHC string format.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword {
    hash: String,
}

impl HashedPassword {
    pub fn from_phc_string(s: impl Into<String>) -> Result<Self, PasswordHashError> {
        let hash = s.into();
        PasswordHash::new(&hash).map_err(|_| PasswordHashError::InvalidHashFormat)?;
        Ok(Self { hash })
    }

    pub fn as_phc_string(&self) -> &str {
        &self.hash
    }

    /// Constant-time verification (inside argon2).
    pub fn verify(&self, password: &ClearTextPassword, pepper: Option<&[u8]>) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.hash) else {
            return false;
        };
        let mut input = password.peppered(pepper);
        let ok = Argon2::default().verify_password(&input, &parsed).is_ok();
        input.zeroize();
        ok
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedPassword")
            .field("hash", &"[HASH]")
            .finish()
    }
}
