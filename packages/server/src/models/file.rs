use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::IngestOutcome;
use crate::entity::{blob, file};

pub use super::shared::Pagination;

/// Response DTO for a single logical file.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileResponse {
    /// Logical file ID (UUIDv7).
    #[schema(example = "01936f0e-1234-7abc-8000-000000000001")]
    pub id: String,
    /// Filename as supplied at upload.
    #[schema(example = "report.pdf")]
    pub original_filename: String,
    /// MIME content type.
    #[schema(example = "application/pdf")]
    pub file_type: String,
    /// File size in bytes.
    #[schema(example = 142857)]
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
    /// SHA-256 content hash.
    #[schema(example = "a1b2c3d4e5f6...")]
    pub content_hash: String,
    /// Whether this upload was deduplicated against existing content.
    pub is_duplicate: bool,
    /// Bytes saved by deduplication for this file (0 for originals).
    pub storage_saved: i64,
    /// Number of logical files currently sharing this file's content.
    pub reference_count: i32,
}

impl FileResponse {
    pub fn from_models(file_model: file::Model, blob_model: &blob::Model) -> Self {
        let storage_saved = if file_model.is_duplicate {
            blob_model.size
        } else {
            0
        };
        Self {
            id: file_model.id.to_string(),
            original_filename: file_model.original_filename,
            file_type: file_model.file_type,
            size: file_model.size,
            uploaded_at: file_model.uploaded_at,
            content_hash: file_model.content_hash,
            is_duplicate: file_model.is_duplicate,
            storage_saved,
            reference_count: blob_model.reference_count,
        }
    }
}

/// Response DTO for a successful upload.
#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    /// Filename of the original upload when this one was deduplicated.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "quarterly-report.pdf")]
    pub duplicate_of: Option<String>,
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        let file_model = outcome.file;
        Self {
            file: FileResponse {
                id: file_model.id.to_string(),
                original_filename: file_model.original_filename,
                file_type: file_model.file_type,
                size: file_model.size,
                uploaded_at: file_model.uploaded_at,
                content_hash: file_model.content_hash,
                is_duplicate: outcome.is_duplicate,
                storage_saved: outcome.storage_saved,
                reference_count: outcome.reference_count,
            },
            duplicate_of: outcome.duplicate_of,
        }
    }
}

/// Response DTO for listing files.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileListResponse {
    pub data: Vec<FileResponse>,
    pub pagination: Pagination,
}

/// Query parameters accepted by the file listing endpoint.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct FileListQuery {
    /// Page number (1-based).
    pub page: Option<u64>,
    /// Items per page (max 100).
    pub per_page: Option<u64>,
    /// Case-insensitive filename substring search.
    pub search: Option<String>,
    /// Case-insensitive exact MIME type match.
    pub file_type: Option<String>,
    /// Minimum file size in bytes (inclusive).
    pub min_size: Option<i64>,
    /// Maximum file size in bytes (inclusive).
    pub max_size: Option<i64>,
    /// RFC 3339 lower bound on upload time (inclusive).
    pub uploaded_after: Option<DateTime<Utc>>,
    /// RFC 3339 upper bound on upload time (inclusive).
    pub uploaded_before: Option<DateTime<Utc>>,
    /// One of: `uploaded_at` (default), `original_filename`, `size`,
    /// `file_type`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
}

/// Response DTO for the distinct file types endpoint.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FileTypesResponse {
    pub file_types: Vec<String>,
}
