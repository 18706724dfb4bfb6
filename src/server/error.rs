//! Mapping of [`AnalyzerError`] onto HTTP responses.

use crate::error::AnalyzerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `"error"`.
    pub status: String,
    pub detail: String,
}

/// An [`AnalyzerError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub AnalyzerError);

impl From<AnalyzerError> for ApiError {
    fn from(err: AnalyzerError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code and client-facing detail.
    ///
    /// Client errors keep their message. Everything else is prefixed, and a
    /// message that touches on API keys is replaced by a generic notice.
    pub fn status_and_detail(&self) -> (StatusCode, String) {
        if self.0.is_client_error() {
            return (StatusCode::BAD_REQUEST, self.0.to_string());
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "Error processing financial document: {}",
                self.0.public_message()
            ),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let body = ErrorBody {
            status: "error".to_string(),
            detail,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_400_with_message() {
        let (status, detail) = ApiError(AnalyzerError::UnsupportedFileType {
            content_type: Some("image/png".into()),
        })
        .status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail, "Only PDF files are allowed.");
    }

    #[test]
    fn server_errors_are_prefixed() {
        let (status, detail) = ApiError(AnalyzerError::ModelTimeout { secs: 30 }).status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            detail,
            "Error processing financial document: LLM call timed out after 30s"
        );
    }

    #[test]
    fn key_errors_are_redacted() {
        let (status, detail) = ApiError(AnalyzerError::ModelFailed {
            attempts: 1,
            detail: "400 API key not valid".into(),
        })
        .status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            detail,
            "Error processing financial document: API authentication error (key-related)"
        );
    }
}
