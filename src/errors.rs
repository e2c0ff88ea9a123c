use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use actix_multipart::MultipartError;
use actix_web::{
    error::ResponseError,
    http::{header::{self, ContentType}, StatusCode},
    HttpResponse
};
use derive_more::Display;
use serde::Serialize;
use uuid::Uuid;
use validator::ValidationErrors;

#[derive(Debug)]
pub enum AppError {
    ValidationError(Vec<FieldError>),
    InvalidInput(String),
    NotFound(String),
    Conflict(String),
    StorageUnavailable(String),
    NotReady(Uuid),
    /// Seconds until the caller may retry.
    RateLimited(u64),
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(errors) => {
                let messages = errors.iter()
                    .map(|e| format!("{}:{}", e.field, e.message))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "validation error: {}", messages)
            }
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {}", msg),
            AppError::NotReady(id) => write!(f, "No variant of photo {} is ready yet", id),
            AppError::RateLimited(secs) => write!(f, "Too many uploads, retry in {}s", secs),
            AppError::InternalError(msg) => write!(f, "Internal server error: {}", msg)
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            AppError::ValidationError(errors) => {
                serde_json::json!({
                    "error": "Validation failed",
                    "details": errors
                })
            }
            _ => {
                serde_json::json!({"error": self.to_string()})
            }
        };

        let mut response = HttpResponse::build(self.status_code());
        response.insert_header(ContentType::json());
        match self {
            AppError::NotReady(_) => {
                response.insert_header((header::RETRY_AFTER, "1"));
            }
            AppError::RateLimited(secs) => {
                response.insert_header((header::RETRY_AFTER, secs.to_string()));
            }
            _ => {}
        }
        response.json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotReady(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(|e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "Invalid value".to_string()),
                })
            })
            .collect();

        AppError::ValidationError(field_errors)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(e) if e.code() == Some(Cow::Borrowed("23505")) => {
                AppError::Conflict("Database conflict occurred".into())
            }
            sqlx::Error::Database(e) if e.code() == Some(Cow::Borrowed("23503")) => {
                AppError::Conflict("Foreign key violation".into())
            }
            _ => AppError::InternalError(format!("Database error: {}", err))
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::InvalidInput(format!("Malformed multipart payload: {}", err))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(format!("Object {}", path)),
            StorageError::AlreadyExists(path) => {
                AppError::Conflict(format!("Storage path {} is already taken", path))
            }
            other => AppError::StorageUnavailable(other.to_string()),
        }
    }
}

/// Failures reported by an object storage backend.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum StorageError {
    #[display("Object not found: {_0}")]
    NotFound(String),

    #[display("Object already exists: {_0}")]
    AlreadyExists(String),

    #[display("Storage backend unreachable: {_0}")]
    Unavailable(String),

    #[display("Storage backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[display("Storage call timed out after {}s", _0.as_secs())]
    Timeout(Duration),
}

impl std::error::Error for StorageError {}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StorageError::Unavailable(format!("request timed out: {}", err))
        } else {
            StorageError::Unavailable(err.to_string())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_maps_to_503_with_retry_after() {
        let err = AppError::NotReady(Uuid::nil());
        let response = err.error_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("1")
        );
    }

    #[test]
    fn rate_limited_carries_retry_after() {
        let response = AppError::RateLimited(7).error_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("7")
        );
    }

    #[test]
    fn taxonomy_status_codes() {
        assert_eq!(AppError::InvalidInput("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::StorageUnavailable("x".into()).status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn storage_not_found_becomes_not_found() {
        let err: AppError = StorageError::NotFound("a/b.jpg".into()).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = StorageError::AlreadyExists("a/b.jpg".into()).into();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("a/b.jpg")));

        let err: AppError = StorageError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(err, AppError::StorageUnavailable(msg) if msg.contains("3s")));
    }
}
