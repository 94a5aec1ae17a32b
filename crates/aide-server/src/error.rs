//! Server error taxonomy
//!
//! [`ErrorCode`] is the stable, machine-readable classification used both for
//! whole-call failures ([`AppError`]) and for per-item outcomes inside batch
//! results, so callers never have to parse message text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::api::response::ErrorResponse;
use crate::db::{DbError, ProjectNameError};
use crate::inventory::{QueryBuildError, ScanError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    Unauthorized,
    InvalidParameter,
    Duplicate,
    DependencyConflict,
    StorageFailure,
    DiskIoFailure,
    Timeout,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::Duplicate => "DUPLICATE",
            ErrorCode::DependencyConflict => "DEPENDENCY_CONFLICT",
            ErrorCode::StorageFailure => "STORAGE_FAILURE",
            ErrorCode::DiskIoFailure => "DISK_IO_FAILURE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    InvalidParameter(String),

    /// A storage transaction failed and was rolled back as a whole.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Disk I/O failure: {0}")]
    DiskIoFailure(String),

    #[error("{0}")]
    Timeout(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Unauthorized(_) => ErrorCode::Unauthorized,
            AppError::InvalidParameter(_) => ErrorCode::InvalidParameter,
            AppError::StorageFailure(_) => ErrorCode::StorageFailure,
            AppError::DiskIoFailure(_) => ErrorCode::DiskIoFailure,
            AppError::Timeout(_) => ErrorCode::Timeout,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidParameter(_) => StatusCode::BAD_REQUEST,
            AppError::StorageFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DiskIoFailure(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let message = match &self {
            AppError::StorageFailure(detail) => {
                tracing::error!(detail = %detail, "Storage failure");
                "The storage transaction failed and was rolled back; the request may be retried"
                    .to_string()
            },
            AppError::Internal(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                "An internal error occurred".to_string()
            },
            AppError::DiskIoFailure(detail) => {
                tracing::error!(detail = %detail, "Disk I/O failure");
                self.to_string()
            },
            _ => self.to_string(),
        };

        (status, Json(ErrorResponse::new(code.as_str(), message))).into_response()
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => AppError::NotFound(msg),
            DbError::Config(msg) => AppError::Internal(msg),
            DbError::Sqlx(err) => AppError::StorageFailure(err.to_string()),
        }
    }
}

impl From<ProjectNameError> for AppError {
    fn from(err: ProjectNameError) -> Self {
        AppError::InvalidParameter(err.to_string())
    }
}

impl From<QueryBuildError> for AppError {
    fn from(err: QueryBuildError) -> Self {
        AppError::InvalidParameter(err.to_string())
    }
}

impl From<ScanError> for AppError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::NotFound(_) => AppError::NotFound(err.to_string()),
            ScanError::TimedOut(_) => AppError::Timeout(err.to_string()),
            ScanError::NotADirectory(_) | ScanError::Io { .. } => {
                AppError::DiskIoFailure(err.to_string())
            },
            ScanError::Aborted(_) => AppError::Internal(err.to_string()),
        }
    }
}

/// Alias for Result with AppError
pub type ApiResult<T> = Result<T, AppError>;
