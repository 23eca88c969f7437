//! Identity error types
//!
//! Two layers:
//! - [`IdentityFailures`]: an identity operation ran and said "no" (wrong
//!   password, duplicate login, broken password rule). Flows render these
//!   inline as `Error: ...`.
//! - [`IdentityError`]: everything else a handler can fail with. It converts
//!   into the kernel `AppError` response.

use std::borrow::Cow;
use std::fmt;

use axum::response::{IntoResponse, Response};
use kernel::error::{app_error::AppError, kind::ErrorKind};
use platform::password::PasswordViolation;
use serde::Serialize;
use thiserror::Error;

pub type IdentityResult<T> = Result<T, IdentityError>;

/// One reason an identity operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityFailure {
    pub code: Cow<'static, str>,
    pub description: String,
}

impl IdentityFailure {
    fn new(code: &'static str, description: impl Into<String>) -> Self {
        Self {
            code: Cow::Borrowed(code),
            description: description.into(),
        }
    }

    pub fn default_error() -> Self {
        Self::new("DefaultError", "An unknown failure has occurred.")
    }

    pub fn concurrency_failure() -> Self {
        Self::new(
            "ConcurrencyFailure",
            "Optimistic concurrency failure, object has been modified.",
        )
    }

    pub fn password_mismatch() -> Self {
        Self::new("PasswordMismatch", "Incorrect password.")
    }

    pub fn invalid_token() -> Self {
        Self::new("InvalidToken", "Invalid token.")
    }

    pub fn recovery_code_redemption_failed() -> Self {
        Self::new(
            "RecoveryCodeRedemptionFailed",
            "Recovery code redemption failed.",
        )
    }

    pub fn login_already_associated() -> Self {
        Self::new(
            "LoginAlreadyAssociated",
            "A user with this login already exists.",
        )
    }

    pub fn invalid_user_name(user_name: &str) -> Self {
        Self::new(
            "InvalidUserName",
            format!("Username '{user_name}' is invalid, can only contain letters or digits."),
        )
    }

    pub fn invalid_email(email: &str) -> Self {
        Self::new("InvalidEmail", format!("Email '{email}' is invalid."))
    }

    pub fn duplicate_user_name(user_name: &str) -> Self {
        Self::new(
            "DuplicateUserName",
            format!("Username '{user_name}' is already taken."),
        )
    }

    pub fn duplicate_role_name(role: &str) -> Self {
        Self::new(
            "DuplicateRoleName",
            format!("Role name '{role}' is already taken."),
        )
    }

    pub fn user_already_has_password() -> Self {
        Self::new("UserAlreadyHasPassword", "User already has a password set.")
    }

    pub fn user_already_in_role(role: &str) -> Self {
        Self::new(
            "UserAlreadyInRole",
            format!("User already in role '{role}'."),
        )
    }
}

impl From<PasswordViolation> for IdentityFailure {
    fn from(violation: PasswordViolation) -> Self {
        Self::new(violation.code(), violation.to_string())
    }
}

/// Non-empty list of [`IdentityFailure`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdentityFailures(Vec<IdentityFailure>);

impl IdentityFailures {
    pub fn new(failures: Vec<IdentityFailure>) -> Self {
        if failures.is_empty() {
            Self(vec![IdentityFailure::default_error()])
        } else {
            Self(failures)
        }
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.0.iter().any(|f| f.code == code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityFailure> {
        self.0.iter()
    }

    /// Descriptions joined with `separator`.
    pub fn describe(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(|f| f.description.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl From<IdentityFailure> for IdentityFailures {
    fn from(failure: IdentityFailure) -> Self {
        Self(vec![failure])
    }
}

impl fmt::Display for IdentityFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(", "))
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Rejected(IdentityFailures),

    #[error("Unable to load user with ID '{0}'.")]
    UserNotFound(String),

    #[error("Unable to load two-factor authentication user.")]
    TwoFactorUserUnavailable,

    /// The page was reached in a state it does not support
    /// (e.g. disabling 2FA for a user who never enabled it).
    #[error("{0}")]
    InvalidOperation(String),

    #[error("The link is invalid or has expired.")]
    InvalidToken,

    #[error("Unknown external login provider '{0}'.")]
    UnknownProvider(String),

    #[error("External login provider failed: {0}")]
    ExternalProvider(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    pub fn rejected(failure: IdentityFailure) -> Self {
        IdentityError::Rejected(failure.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IdentityError::Rejected(_) => ErrorKind::UnprocessableEntity,
            IdentityError::UserNotFound(_) => ErrorKind::NotFound,
            IdentityError::TwoFactorUserUnavailable
            | IdentityError::InvalidOperation(_)
            | IdentityError::InvalidToken
            | IdentityError::UnknownProvider(_) => ErrorKind::BadRequest,
            IdentityError::ExternalProvider(_) => ErrorKind::BadGateway,
            IdentityError::Database(_) | IdentityError::Internal(_) => {
                ErrorKind::InternalServerError
            }
        }
    }

    pub fn status_code(&self) -> http::StatusCode {
        http::StatusCode::from_u16(self.kind().status_code())
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Server-side details stay in the log.
    pub fn to_app_error(&self) -> AppError {
        match self {
            IdentityError::Database(_) | IdentityError::Internal(_) => {
                AppError::internal("An unexpected error occurred.")
            }
            IdentityError::ExternalProvider(_) => {
                AppError::bad_gateway("The external login provider could not be reached.")
            }
            other => AppError::new(other.kind(), other.to_string()),
        }
    }

    fn log(&self) {
        match self {
            IdentityError::Database(e) => {
                tracing::error!(error = %e, "Identity database error");
            }
            IdentityError::Internal(msg) => {
                tracing::error!(detail = %msg, "Identity internal error");
            }
            IdentityError::ExternalProvider(msg) => {
                tracing::error!(detail = %msg, "External login provider error");
            }
            IdentityError::UserNotFound(id) => {
                tracing::warn!(user_id = %id, "User not found");
            }
            IdentityError::TwoFactorUserUnavailable => {
                tracing::warn!("Two-factor step reached without a pending two-factor user");
            }
            _ => {
                tracing::debug!(error = %self, "Identity error");
            }
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        self.log();
        self.to_app_error().into_response()
    }
}

/// Lets a flow render a refusal inline while still propagating real errors.
pub trait RejectionExt<T> {
    /// `Ok(Err(failures))` for a refusal, `Err` for everything else.
    fn rejection(self) -> IdentityResult<Result<T, IdentityFailures>>;
}

impl<T> RejectionExt<T> for IdentityResult<T> {
    fn rejection(self) -> IdentityResult<Result<T, IdentityFailures>> {
        match self {
            Ok(value) => Ok(Ok(value)),
            Err(IdentityError::Rejected(failures)) => Ok(Err(failures)),
            Err(e) => Err(e),
        }
    }
}

impl From<IdentityFailures> for IdentityError {
    fn from(failures: IdentityFailures) -> Self {
        IdentityError::Rejected(failures)
    }
}

impl From<platform::password::PasswordHashError> for IdentityError {
    fn from(err: platform::password::PasswordHashError) -> Self {
        IdentityError::Internal(err.to_string())
    }
}

impl From<platform::protector::ProtectError> for IdentityError {
    fn from(err: platform::protector::ProtectError) -> Self {
        match err {
            platform::protector::ProtectError::Serialization(e) => {
                IdentityError::Internal(e.to_string())
            }
            _ => IdentityError::InvalidToken,
        }
    }
}
