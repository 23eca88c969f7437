//! Page outcomes.
//!
//! Every page step ends in exactly one of two ways: a redirect, or the page
//! rendered with whatever messages the step produced.

use serde::Serialize;

use crate::application::validation::FieldError;
use crate::error::IdentityFailures;
use crate::navigation::Redirect;

#[must_use]
#[derive(Debug)]
pub enum Flow<T> {
    Redirect(Redirect),
    Render(Page<T>),
}

impl<T> Flow<T> {
    pub fn render(data: T) -> Self {
        Flow::Render(Page::new(data))
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            Flow::Redirect(redirect) => Some(redirect),
            Flow::Render(_) => None,
        }
    }

    pub fn page(&self) -> Option<&Page<T>> {
        match self {
            Flow::Render(page) => Some(page),
            Flow::Redirect(_) => None,
        }
    }
}

impl<T> From<Redirect> for Flow<T> {
    fn from(redirect: Redirect) -> Self {
        Flow::Redirect(redirect)
    }
}

impl<T> From<Page<T>> for Flow<T> {
    fn from(page: Page<T>) -> Self {
        Flow::Render(page)
    }
}

/// A rendered page: view data plus the messages shown above the form.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Page-level notice. When `None`, the `STATUS_MESSAGE` cookie is shown.
    pub status_message: Option<String>,
    /// Inline outcome of the last submit (`Error: ...` on failure).
    pub message: Option<String>,
    pub errors: Vec<FieldError>,
    pub data: T,
}

impl<T> Page<T> {
    pub fn new(data: T) -> Self {
        Self {
            status_message: None,
            message: None,
            errors: Vec::new(),
            data,
        }
    }

    pub fn with_status(mut self, status_message: impl Into<String>) -> Self {
        self.status_message = Some(status_message.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_failures(self, failures: &IdentityFailures) -> Self {
        self.with_message(format!("Error: {}", failures.describe(", ")))
    }

    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }
}
