//! Lookup key normalization for user names, emails and role names.

use unicode_normalization::UnicodeNormalization;

/// NFKC, then upper case. Unique indexes are built on this form.
pub fn normalize_key(value: &str) -> String {
    value.trim().nfkc().collect::<String>().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  admin "), "ADMIN");
        assert_eq!(normalize_key("ｕｓｅｒ@example.com"), "USER@EXAMPLE.COM");
    }
}
