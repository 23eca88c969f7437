//! Authenticator Key Value Object
//!
//! Shared secret for TOTP authenticator apps (RFC 6238, SHA1, 6 digits,
//! 30 second step, one step of clock skew either way).

use totp_rs::{Algorithm, Secret, TOTP};
use url::form_urlencoded::byte_serialize;

use crate::error::IdentityError;

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
const TOTP_SKEW: u8 = 1;

/// Base32 (unpadded, upper case) authenticator secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatorKey(String);

impl std::fmt::Debug for AuthenticatorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthenticatorKey([REDACTED])")
    }
}

impl AuthenticatorKey {
    pub fn generate() -> Self {
        Self(Secret::generate_secret().to_encoded().to_string())
    }

    pub fn from_stored(secret: impl Into<String>) -> Result<Self, IdentityError> {
        let secret = secret.into();
        Secret::Encoded(secret.clone())
            .to_bytes()
            .map_err(|e| IdentityError::Internal(format!("Invalid authenticator key: {e}")))?;
        Ok(Self(secret))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key as shown to the user: lower case, groups of four.
    ///
    /// `JBSWY3DPEHPK3PXP` becomes `jbsw y3dp ehpk 3pxp`.
    pub fn formatted(&self) -> String {
        self.0
            .to_lowercase()
            .chars()
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|group| group.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `otpauth://` URI understood by authenticator apps.
    pub fn authenticator_uri(&self, issuer: &str, email: &str) -> String {
        let issuer = encode(issuer);
        format!(
            "otpauth://totp/{issuer}:{}?secret={}&issuer={issuer}&digits={TOTP_DIGITS}",
            encode(email),
            self.0
        )
    }

    fn to_totp(&self, issuer: &str, account_name: &str) -> Result<TOTP, IdentityError> {
        let secret = Secret::Encoded(self.0.clone())
            .to_bytes()
            .map_err(|e| IdentityError::Internal(format!("Invalid authenticator key: {e}")))?;
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret,
            Some(issuer.to_string()),
            account_name.to_string(),
        )
        .map_err(|e| IdentityError::Internal(format!("Failed to create TOTP: {e}")))
    }

    /// Check a code typed by the user. Spaces and hyphens are ignored.
    pub fn verify(&self, code: &str, unix_time: u64) -> Result<bool, IdentityError> {
        let code = strip_code(code);
        if code.len() != TOTP_DIGITS || !code.chars().all(|c| c.is_ascii_digit()) {
            return Ok(false);
        }
        // The account name is irrelevant for verification.
        let totp = self.to_totp("verify", "account")?;
        Ok(totp.check(&code, unix_time))
    }

    /// QR code (base64 PNG) for the enable-authenticator page.
    pub fn qr_code_base64(&self, issuer: &str, email: &str) -> Result<String, IdentityError> {
        self.to_totp(issuer, email)?
            .get_qr_base64()
            .map_err(|e| IdentityError::Internal(format!("Failed to generate QR code: {e}")))
    }

    #[cfg(test)]
    pub fn code_at(&self, unix_time: u64) -> String {
        self.to_totp("test", "account")
            .map(|totp| totp.generate(unix_time))
            .unwrap_or_default()
    }
}

/// Removes the separators users commonly type into codes.
pub fn strip_code(code: &str) -> String {
    code.chars().filter(|c| *c != ' ' && *c != '-').collect()
}

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_in_groups_of_four() {
        let key = AuthenticatorKey::from_stored("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(
            key.formatted(),
            "jbsw y3dp ehpk 3pxp jbsw y3dp ehpk 3pxp"
        );
    }

    #[test]
    fn test_authenticator_uri() {
        let key = AuthenticatorKey::from_stored("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(
            key.authenticator_uri("Barebones", "alice@example.com"),
            "otpauth://totp/Barebones:alice%40example.com?secret=JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP&issuer=Barebones&digits=6"
        );
    }

    #[test]
    fn test_verify_accepts_current_and_adjacent_step() {
        let key = AuthenticatorKey::generate();
        let now = 1_700_000_000;
        assert!(key.verify(&key.code_at(now), now).unwrap());
        assert!(key.verify(&key.code_at(now - TOTP_STEP), now).unwrap());
        assert!(!key.verify(&key.code_at(now - 10 * TOTP_STEP), now).unwrap());
    }

    #[test]
    fn test_verify_strips_separators_and_rejects_garbage() {
        let key = AuthenticatorKey::generate();
        let now = 1_700_000_000;
        let code = key.code_at(now);
        let spaced = format!("{} {}", &code[..3], &code[3..]);
        assert!(key.verify(&spaced, now).unwrap());
        assert!(!key.verify("12a456", now).unwrap());
        assert!(!key.verify("1234567", now).unwrap());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = AuthenticatorKey::generate();
        assert!(!format!("{key:?}").contains(key.as_str()));
    }
}
