//! Problem document rendering and the axum response mapping.

use serde::Serialize;

use super::app_error::AppError;

/// RFC 7807 problem document.
#[derive(Debug, Serialize)]
pub struct ProblemDetails<'a> {
    #[serde(rename = "type")]
    pub type_uri: String,
    pub title: &'static str,
    pub status: u16,
    pub detail: &'a str,
}

impl AppError {
    pub fn problem_details(&self) -> ProblemDetails<'_> {
        ProblemDetails {
            type_uri: format!("https://httpstatuses.io/{}", self.status_code()),
            title: self.kind().as_str(),
            status: self.status_code(),
            detail: self.message(),
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.problem_details())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::kind::ErrorKind;

    #[test]
    fn test_problem_details_shape() {
        let err = AppError::new(ErrorKind::UnprocessableEntity, "Error: Incorrect password.");
        let body = serde_json::to_value(err.problem_details()).unwrap();
        assert_eq!(body["status"], 422);
        assert_eq!(body["title"], "Unprocessable Entity");
        assert_eq!(body["detail"], "Error: Incorrect password.");
    }
}
