//! Signed, purpose-bound, expiring tickets.
//!
//! A ticket is `base64url(json envelope) "." base64url(HMAC-SHA256)`. The MAC
//! covers the purpose string as well as the payload, so a ticket minted for
//! one purpose (say, an email confirmation link) never verifies as another
//! (say, an authentication cookie). Payloads are signed, not encrypted.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{constant_time_eq, from_base64url, hmac_sha256, to_base64url};

#[derive(Debug, thiserror::Error)]
pub enum ProtectError {
    #[error("ticket is malformed")]
    Malformed,
    #[error("ticket signature does not match")]
    BadSignature,
    #[error("ticket expired")]
    Expired,
    #[error("ticket payload could not be (de)serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    /// Expiry, unix milliseconds.
    exp: i64,
    data: T,
}

#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct TicketProtector {
    key: [u8; 32],
}

impl std::fmt::Debug for TicketProtector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TicketProtector([REDACTED])")
    }
}

impl TicketProtector {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn protect<T: Serialize>(
        &self,
        purpose: &str,
        data: &T,
        expires_at_ms: i64,
    ) -> Result<String, ProtectError> {
        let body = serde_json::to_vec(&Envelope {
            exp: expires_at_ms,
            data,
        })?;
        let body = to_base64url(&body);
        let mac = self.sign(purpose, body.as_bytes());
        Ok(format!("{body}.{}", to_base64url(&mac)))
    }

    /// Verify and decode a ticket. Signature is checked before anything in
    /// the payload is trusted.
    pub fn unprotect<T: DeserializeOwned>(
        &self,
        purpose: &str,
        ticket: &str,
        now_ms: i64,
    ) -> Result<T, ProtectError> {
        let (body, mac) = ticket.split_once('.').ok_or(ProtectError::Malformed)?;
        let mac = from_base64url(mac).map_err(|_| ProtectError::Malformed)?;
        let expected = self.sign(purpose, body.as_bytes());
        if !constant_time_eq(&mac, &expected) {
            return Err(ProtectError::BadSignature);
        }

        let json = from_base64url(body).map_err(|_| ProtectError::Malformed)?;
        let envelope: Envelope<T> = serde_json::from_slice(&json)?;
        if envelope.exp <= now_ms {
            return Err(ProtectError::Expired);
        }
        Ok(envelope.data)
    }

    fn sign(&self, purpose: &str, body: &[u8]) -> [u8; 32] {
        hmac_sha256(&self.key, &[purpose.as_bytes(), &[0u8], body])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        user: String,
        stamp: String,
    }

    fn payload() -> Payload {
        Payload {
            user: "alice".into(),
            stamp: "S1".into(),
        }
    }

    #[test]
    fn test_valid_ticket_opens() {
        let protector = TicketProtector::new([7u8; 32]);
        let ticket = protector.protect("EmailConfirmation", &payload(), 2_000).unwrap();
        let opened: Payload = protector.unprotect("EmailConfirmation", &ticket, 1_000).unwrap();
        assert_eq!(opened, payload());
    }

    #[test]
    fn test_purpose_mismatch_is_rejected() {
        let protector = TicketProtector::new([7u8; 32]);
        let ticket = protector.protect("ResetPassword", &payload(), 2_000).unwrap();
        let result = protector.unprotect::<Payload>("EmailConfirmation", &ticket, 1_000);
        assert!(matches!(result, Err(ProtectError::BadSignature)));
    }

    #[test]
    fn test_other_key_is_rejected() {
        let ticket = TicketProtector::new([1u8; 32])
            .protect("p", &payload(), 2_000)
            .unwrap();
        let result = TicketProtector::new([2u8; 32]).unprotect::<Payload>("p", &ticket, 1_000);
        assert!(matches!(result, Err(ProtectError::BadSignature)));
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let protector = TicketProtector::new([7u8; 32]);
        let ticket = protector.protect("p", &payload(), 2_000).unwrap();
        let (_, mac) = ticket.split_once('.').unwrap();
        let forged_body = to_base64url(br#"{"exp":9999999,"data":{"user":"mallory","stamp":"S1"}}"#);
        let forged = format!("{forged_body}.{mac}");
        assert!(matches!(
            protector.unprotect::<Payload>("p", &forged, 1_000),
            Err(ProtectError::BadSignature)
        ));
    }

    #[test]
    fn test_expired_ticket_is_rejected() {
        let protector = TicketProtector::new([7u8; 32]);
        let ticket = protector.protect("p", &payload(), 1_000).unwrap();
        assert!(matches!(
            protector.unprotect::<Payload>("p", &ticket, 1_000),
            Err(ProtectError::Expired)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let protector = TicketProtector::new([7u8; 32]);
        assert!(matches!(
            protector.unprotect::<Payload>("p", "no-dot-here", 0),
            Err(ProtectError::Malformed)
        ));
    }
}
