//! Form validation.
//!
//! Checks run in field order and collect every problem; a form is only
//! submitted to the identity layer when the list comes back empty.

use serde::Serialize;

use crate::domain::value_object::Email;
use crate::domain::value_object::phone_number::is_valid_phone_number;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, field: &'static str, message: String) {
        self.errors.push(FieldError { field, message });
    }

    fn has_error(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn required(&mut self, field: &'static str, display: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.push(field, format!("The {display} field is required."));
        }
        self
    }

    /// Empty values are left to [`Validator::required`].
    pub fn email(&mut self, field: &'static str, display: &str, value: &str) -> &mut Self {
        if !value.trim().is_empty() && !Email::is_valid(value.trim()) {
            self.push(field, format!("The {display} field is not a valid e-mail address."));
        }
        self
    }

    pub fn string_length(
        &mut self,
        field: &'static str,
        display: &str,
        value: &str,
        min: usize,
        max: usize,
    ) -> &mut Self {
        let len = value.chars().count();
        if !self.has_error(field) && !value.is_empty() && (len < min || len > max) {
            self.push(
                field,
                format!("The {display} must be at least {min} and at max {max} characters long."),
            );
        }
        self
    }

    pub fn compare(
        &mut self,
        field: &'static str,
        value: &str,
        other: &str,
        message: &str,
    ) -> &mut Self {
        if value != other {
            self.push(field, message.to_string());
        }
        self
    }

    pub fn phone(&mut self, field: &'static str, display: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            if !is_valid_phone_number(value) {
                self.push(field, format!("The {display} field is not a valid phone number."));
            }
        }
        self
    }

    pub fn finish(&mut self) -> Result<(), Vec<FieldError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_every_error() {
        let errors = Validator::new()
            .required("email", "Email", "")
            .required("password", "Password", "abc")
            .string_length("password", "Password", "abc", 6, 100)
            .compare(
                "confirmPassword",
                "abc",
                "abd",
                "The password and confirmation password do not match.",
            )
            .finish()
            .unwrap_err();

        let messages: Vec<_> = errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "The Email field is required.",
                "The Password must be at least 6 and at max 100 characters long.",
                "The password and confirmation password do not match.",
            ]
        );
    }

    #[test]
    fn test_email_and_phone_formats() {
        let errors = Validator::new()
            .email("email", "Email", "not-an-email")
            .phone("phoneNumber", "Phone number", Some("call me"))
            .phone("other", "Other", None)
            .finish()
            .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "email");
        assert_eq!(errors[1].message, "The Phone number field is not a valid phone number.");
    }

    #[test]
    fn test_valid_form_passes() {
        assert!(
            Validator::new()
                .required("email", "Email", "alice@example.com")
                .email("email", "Email", "alice@example.com")
                .finish()
                .is_ok()
        );
    }
}
