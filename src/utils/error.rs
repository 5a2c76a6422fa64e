use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use crate::store::StoreError;
use crate::utils::response::error as error_response;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Event store unavailable")]
    ConnectionError(#[source] StoreError),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(err.to_string()),
            StoreError::Conflict(_) => AppError::Conflict(err.to_string()),
            StoreError::Invalid(msg) => AppError::InvalidIdentifier(msg),
            StoreError::Connection { .. } => AppError::ConnectionError(err),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        let field = match rejection {
            JsonRejection::JsonDataError(_) => rejected_field(&message),
            _ => None,
        };
        AppError::ValidationError(ValidationError {
            field,
            message,
        })
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        let message = rejection.body_text();
        let field = match rejection {
            QueryRejection::FailedToDeserializeQueryString(_) => rejected_field(&message),
            _ => None,
        };
        AppError::ValidationError(ValidationError {
            field,
            message,
        })
    }
}

/// Pulls the offending field out of a deserialization rejection.
///
/// The text reads `<prefix>: <path>: <reason>` when the failure sits below the
/// root. A required key that is absent reads `<prefix>: missing field ...`
/// with the key name in backticks.
fn rejected_field(text: &str) -> Option<String> {
    let (_, detail) = text.split_once(": ")?;
    if let Some(rest) = detail.strip_prefix("missing field `") {
        return rest
            .split_once('`')
            .map(|(name, _)| name.to_string())
            .filter(|name| !name.is_empty());
    }
    let (path, _) = detail.split_once(": ")?;
    let is_path = !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '[' | ']'));
    is_path.then(|| path.to_string())
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidIdentifier(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ConnectionError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::ConnectionError(_) => "CONNECTION_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::ConnectionError(e) => {
                error!(error = ?e, "Event store error");
            }
            AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Unexpected error");
            }
            _ => {
                warn!(code = self.code(), error = %self, "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let (public_message, field) = match self {
            AppError::ValidationError(err) => (err.message, err.field),
            AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidIdentifier(msg) => (msg, None),
            AppError::ConnectionError(_) => {
                ("An error occurred while accessing the database".to_string(), None)
            }
            AppError::InternalServerError(_) => ("An unexpected error occurred".to_string(), None),
        };

        error_response(code, public_message, field, None, status)
    }
}
