//! Domain error types for the organization server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.
//! Every variant maps to a stable `{error, code, message}` JSON body.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Reason code attached to 403 responses when the caller's email is unverified.
pub const EMAIL_NOT_VERIFIED: &str = "EMAIL_NOT_VERIFIED";

/// Reason code attached to 403 responses when the caller's membership role is too low.
pub const INSUFFICIENT_ROLE: &str = "INSUFFICIENT_ROLE";

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No credential, or the identity provider did not confirm it
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Valid identity whose email address is not verified
    #[error("Email address is not verified")]
    EmailNotVerified,

    /// Valid identity without the membership role required
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Identity or OAuth2 provider unreachable or erroring
    #[error("Upstream provider error: {0}")]
    Upstream(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Unexpected failure (serialization, inconsistent state)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Machine-readable `(error, code)` pair for the response body.
    pub fn kind(&self) -> (&'static str, Option<&'static str>) {
        match self {
            AppError::Unauthenticated(_) => ("UNAUTHENTICATED", None),
            AppError::EmailNotVerified => ("FORBIDDEN", Some(EMAIL_NOT_VERIFIED)),
            AppError::Forbidden(_) => ("FORBIDDEN", Some(INSUFFICIENT_ROLE)),
            AppError::NotFound(_) => ("NOT_FOUND", None),
            AppError::Conflict(_) => ("CONFLICT", None),
            AppError::InvalidInput(_) => ("INVALID_INPUT", None),
            AppError::Upstream(_) => ("UPSTREAM_UNAVAILABLE", None),
            AppError::Database(_) => ("DATABASE_ERROR", None),
            AppError::Internal(_) => ("INTERNAL_ERROR", None),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::EmailNotVerified | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error, code) = self.kind();

        let message = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                "An internal database error occurred".to_string()
            }
            AppError::Internal(err_str) => {
                tracing::error!("Internal error: {}", err_str);
                "An internal error occurred".to_string()
            }
            AppError::Upstream(err_str) => {
                tracing::warn!("Upstream error: {}", err_str);
                "An upstream provider is unavailable".to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error.to_string(),
            code: code.map(str::to_string),
            message,
        })
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    /// Reason code the client can branch on (e.g. `EMAIL_NOT_VERIFIED`)
    pub code: Option<String>,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(ref code) => write!(f, "{} ({}): {}", self.error, code, self.message),
            None => write!(f, "{}: {}", self.error, self.message),
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => AppError::Conflict(detail),
            Some(sea_orm::SqlErr::ForeignKeyConstraintViolation(detail)) => {
                AppError::InvalidInput(detail)
            }
            _ => AppError::Database(err.to_string()),
        }
    }
}

impl From<sea_orm::TransactionError<sea_orm::DbErr>> for AppError {
    fn from(err: sea_orm::TransactionError<sea_orm::DbErr>) -> Self {
        match err {
            sea_orm::TransactionError::Connection(e) => e.into(),
            sea_orm::TransactionError::Transaction(e) => e.into(),
        }
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}
