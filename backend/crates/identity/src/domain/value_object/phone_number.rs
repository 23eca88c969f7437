//! Phone number format check.

/// Loose phone check: digits with the usual separators, an optional
/// leading `+` and an optional `x`/`ext.` extension. At least one digit.
pub fn is_valid_phone_number(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let lower = value.to_lowercase();
    let (number, extension) = match lower.find("ext.").or_else(|| lower.find('x')) {
        Some(index) => lower.split_at(index),
        None => (lower.as_str(), ""),
    };
    let extension = extension
        .trim_start_matches("ext.")
        .trim_start_matches('x')
        .trim();

    let number = number.strip_prefix('+').unwrap_or(number);
    let number_ok = number.chars().any(|c| c.is_ascii_digit())
        && number
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '.' | '(' | ')'));
    let extension_ok = extension.chars().all(|c| c.is_ascii_digit());
    number_ok && extension_ok
}
