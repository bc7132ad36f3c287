//! HTTP error body: `{statusCode, message, error}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// A single message, or one message per failed validation rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub status_code: u16,
    pub message: ErrorMessage,
    /// Reason phrase of the status code
    pub error: String,
}

/// API error with status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ApiErrorResponse,
}

impl ApiError {
    fn with_message(status: StatusCode, message: ErrorMessage) -> Self {
        Self {
            status,
            response: ApiErrorResponse {
                status_code: status.as_u16(),
                message,
                error: status.canonical_reason().unwrap_or("Error").to_string(),
            },
        }
    }

    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::with_message(status, ErrorMessage::Single(message.into()))
    }

    /// 400 listing every failed validation rule
    pub fn validation(messages: Vec<String>) -> Self {
        Self::with_message(StatusCode::BAD_REQUEST, ErrorMessage::Many(messages))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { message } => Self::not_found(message),
            DomainError::Validation { message } => Self::bad_request(message),
            DomainError::InvalidId { message } => Self::bad_request(message),
            DomainError::Conflict { message } => Self::unprocessable(message),
            DomainError::IngestionFailed { message } => {
                tracing::error!(error = %message, "User import failed");
                Self::internal("Bulk import failed")
            }
            DomainError::Configuration { message }
            | DomainError::Internal { message }
            | DomainError::Storage { message } => {
                tracing::error!(error = %message, "Request failed");
                Self::internal("Internal server error")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.response.message {
            ErrorMessage::Single(message) => write!(f, "{}: {}", self.status, message),
            ErrorMessage::Many(messages) => write!(f, "{}: {}", self.status, messages.join("; ")),
        }
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_api_error_body() {
        let err = ApiError::not_found("User not found");
        let body = serde_json::to_value(&err.response).unwrap();

        assert_eq!(
            body,
            json!({"statusCode": 404, "message": "User not found", "error": "Not Found"})
        );
    }

    #[test]
    fn test_validation_error_lists_messages() {
        let err = ApiError::validation(vec![
            "email must be an email".to_string(),
            "Invalid phone number format".to_string(),
        ]);
        let body = serde_json::to_value(&err.response).unwrap();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"].as_array().unwrap().len(), 2);
        assert_eq!(body["error"], "Bad Request");
    }

    #[test]
    fn test_domain_error_conversion() {
        let cases = [
            (DomainError::not_found("x"), StatusCode::NOT_FOUND),
            (DomainError::validation("x"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("x"), StatusCode::BAD_REQUEST),
            (DomainError::conflict("x"), StatusCode::UNPROCESSABLE_ENTITY),
            (DomainError::ingestion_failed("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::storage("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (DomainError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (domain_err, status) in cases {
            assert_eq!(ApiError::from(domain_err).status, status);
        }
    }

    #[test]
    fn test_storage_details_are_not_exposed() {
        let err = ApiError::from(DomainError::storage("password authentication failed"));
        assert_eq!(
            err.response.message,
            ErrorMessage::Single("Internal server error".to_string())
        );
    }

    #[test]
    fn test_conflict_keeps_message() {
        let err = ApiError::from(DomainError::conflict("Email must be unique"));
        assert_eq!(err.response.status_code, 422);
        assert_eq!(
            err.response.message,
            ErrorMessage::Single("Email must be unique".to_string())
        );
        assert_eq!(err.response.error, "Unprocessable Entity");
    }
}
