use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `NOT_FOUND`,
    /// `STORAGE_FULL`, `TRANSIENT_IO`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Empty file upload is not allowed")]
    pub message: String,
}

/// Application-level error type.
///
/// Digest-race conflicts during upload are recovered inside the
/// deduplication engine and never reach this type.
#[derive(Debug)]
pub enum AppError {
    /// Rejected before any storage side effect: empty/missing file,
    /// oversized upload, malformed filename or id.
    Validation(String),
    NotFound(String),
    /// Disk or quota exhausted while staging or committing; staged data
    /// has been cleaned up.
    ResourceExhausted(String),
    /// Stream read/write failure; the whole upload may be resubmitted.
    TransientIo(String),
    /// Internal-consistency failure (including reference-count
    /// invariant violations). Logged; indicates a bug, not a normal
    /// failure path.
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: msg,
                },
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    code: "NOT_FOUND",
                    message: msg,
                },
            ),
            AppError::ResourceExhausted(detail) => {
                tracing::warn!("Storage exhausted: {}", detail);
                (
                    StatusCode::INSUFFICIENT_STORAGE,
                    ErrorBody {
                        code: "STORAGE_FULL",
                        message: "Insufficient storage to accept the upload".into(),
                    },
                )
            }
            AppError::TransientIo(detail) => {
                tracing::warn!("Transient IO failure: {}", detail);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorBody {
                        code: "TRANSIENT_IO",
                        message: "Temporary I/O failure, retry the request".into(),
                    },
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "An unexpected error occurred".into(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, Json(body)).into_response()
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        use std::io::ErrorKind;

        match err {
            StorageError::NotFound(hash) => AppError::NotFound(format!("Blob {hash} not found")),
            StorageError::InvalidHash(msg) => {
                AppError::Internal(format!("Corrupt content hash: {msg}"))
            }
            StorageError::SizeLimitExceeded { actual, limit } => AppError::Validation(format!(
                "File exceeds maximum size of {limit} bytes (received {actual})"
            )),
            StorageError::Io(e) => match e.kind() {
                ErrorKind::StorageFull | ErrorKind::QuotaExceeded => {
                    AppError::ResourceExhausted(e.to_string())
                }
                ErrorKind::UnexpectedEof
                | ErrorKind::BrokenPipe
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::TimedOut => AppError::TransientIo(e.to_string()),
                _ => AppError::Internal(format!("Storage IO error: {e}")),
            },
        }
    }
}
