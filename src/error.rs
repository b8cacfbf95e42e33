//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    // Domain errors
    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    #[error(transparent)]
    Ingestion(#[from] crate::ingestion::IngestionError),

    #[error(transparent)]
    Merge(#[from] crate::merge::MergeError),

    #[error(transparent)]
    Projection(#[from] crate::projection::ProjectionError),

    // Server errors (5xx)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn domain_status(err: &crate::domain::DomainError) -> (StatusCode, &'static str) {
    use crate::domain::DomainError;
    match err {
        DomainError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "invalid_payload"),
        DomainError::BatchShapeInvalid => (StatusCode::BAD_REQUEST, "batch_shape_invalid"),
        DomainError::NoneAccepted => (StatusCode::BAD_REQUEST, "none_accepted"),
        DomainError::MergeInvalid(_) => (StatusCode::BAD_REQUEST, "merge_invalid"),
        DomainError::UserNotFound(_) => (StatusCode::NOT_FOUND, "user_not_found"),
        DomainError::WorkoutNotFound(_) => (StatusCode::NOT_FOUND, "workout_not_found"),
        DomainError::ProjectionUpdateFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "projection_update_failed")
        }
        DomainError::RebuildFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "rebuild_failed"),
        DomainError::MergeFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "merge_failed"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, details) = match &self {
            // 400 Bad Request
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", Some(msg.clone()))
            }

            // 403 Forbidden
            AppError::PermissionDenied => (StatusCode::FORBIDDEN, "permission_denied", None),
            AppError::Forbidden(msg) => {
                (StatusCode::FORBIDDEN, "forbidden", Some(msg.clone()))
            }

            // 404 Not Found
            AppError::UserNotFound(id) => {
                (StatusCode::NOT_FOUND, "user_not_found", Some(id.clone()))
            }

            // 400 Missing Header
            AppError::MissingHeader(header) => {
                (StatusCode::BAD_REQUEST, "missing_header", Some(header.clone()))
            }

            // Domain errors - map to appropriate HTTP status
            AppError::Domain(ref domain_err) => {
                let (status, code) = domain_status(domain_err);
                (status, code, Some(domain_err.to_string()))
            }

            AppError::Ingestion(ref e) => match e {
                crate::ingestion::IngestionError::Domain(domain_err) => {
                    let (status, code) = domain_status(domain_err);
                    (status, code, Some(domain_err.to_string()))
                }
                other => {
                    tracing::error!("ingestion error: {:?}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "ingestion_failed", None)
                }
            },

            AppError::Merge(ref e) => match e {
                crate::merge::MergeError::Domain(domain_err) => {
                    let (status, code) = domain_status(domain_err);
                    (status, code, Some(domain_err.to_string()))
                }
                other => {
                    tracing::error!("merge error: {:?}", other);
                    (StatusCode::INTERNAL_SERVER_ERROR, "merge_failed", None)
                }
            },

            AppError::Projection(ref e) => {
                tracing::error!("projection error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "rebuild_failed", None)
            }

            // 500 Internal Server Error
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
            AppError::Config(e) => {
                tracing::error!("Config error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None)
            }
        };

        let body = ErrorResponse {
            error: self.to_string(),
            error_code: error_code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
