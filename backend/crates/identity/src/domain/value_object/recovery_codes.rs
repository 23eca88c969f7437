//! Two-factor recovery codes.
//!
//! Codes are shown to the user once, as `XXXXX-XXXXX`, and only their
//! SHA-256 digests are stored (`;`-separated).

use platform::crypto::{sha256, to_hex_upper};
use rand::Rng;

/// Unambiguous characters (no 0/O, 1/I/L, S/5, ...).
const ALPHABET: &[u8] = b"23456789BCDFGHJKMNPQRTVWXY";
const HALF_LEN: usize = 5;

pub fn generate_recovery_code() -> String {
    let mut rng = rand::rng();
    let mut half = || -> String {
        (0..HALF_LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    };
    let first = half();
    let second = half();
    format!("{first}-{second}")
}

fn digest(code: &str) -> String {
    let canonical: String = code
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    to_hex_upper(&sha256(canonical.as_bytes()))
}

/// The remaining (unredeemed) codes of one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryCodeSet {
    digests: Vec<String>,
}

impl RecoveryCodeSet {
    /// Generate `count` fresh codes. Returns the set to store and the
    /// plain codes to show.
    pub fn generate(count: usize) -> (Self, Vec<String>) {
        let codes: Vec<String> = (0..count).map(|_| generate_recovery_code()).collect();
        let set = Self {
            digests: codes.iter().map(|c| digest(c)).collect(),
        };
        (set, codes)
    }

    pub fn from_stored(value: &str) -> Self {
        Self {
            digests: value
                .split(';')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn to_stored(&self) -> String {
        self.digests.join(";")
    }

    pub fn count(&self) -> usize {
        self.digests.len()
    }

    /// Consume `code`. A code can be redeemed once.
    pub fn redeem(&mut self, code: &str) -> bool {
        let wanted = digest(code);
        match self.digests.iter().position(|d| *d == wanted) {
            Some(index) => {
                self.digests.remove(index);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_format() {
        let code = generate_recovery_code();
        assert_eq!(code.len(), 11);
        assert_eq!(&code[5..6], "-");
        assert!(
            code.bytes()
                .filter(|b| *b != b'-')
                .all(|b| ALPHABET.contains(&b))
        );
    }

    #[test]
    fn test_generated_codes_are_stored_as_digests() {
        let (set, codes) = RecoveryCodeSet::generate(10);
        assert_eq!(codes.len(), 10);
        assert_eq!(set.count(), 10);
        let stored = set.to_stored();
        assert!(codes.iter().all(|c| !stored.contains(c.as_str())));
        assert_eq!(RecoveryCodeSet::from_stored(&stored), set);
    }

    #[test]
    fn test_redeem_once() {
        let (mut set, codes) = RecoveryCodeSet::generate(3);
        assert!(set.redeem(&codes[1].to_lowercase()));
        assert!(!set.redeem(&codes[1]));
        assert_eq!(set.count(), 2);
        assert!(!set.redeem("AAAAA-AAAAA"));
    }

    #[test]
    fn test_empty_store() {
        assert_eq!(RecoveryCodeSet::from_stored("").count(), 0);
    }
}
