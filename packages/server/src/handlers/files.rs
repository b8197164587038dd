use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, body::Body};
use common::storage::BoxReader;
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::instrument;
use uuid::Uuid;

use crate::dedup::{IngestOutcome, UploadMetadata};
use crate::error::{AppError, ErrorBody};
use crate::models::file::{
    FileListQuery, FileListResponse, FileResponse, FileTypesResponse, Pagination, UploadResponse,
};
use crate::repository::{FileFilter, FileSortBy};
use crate::state::AppState;
use crate::stats::{StatsSnapshot, compute_stats};
use crate::utils::filename::validate_filename;

pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(256 * 1024 * 1024) // above the configured store limit
}

#[utoipa::path(
    post,
    path = "/api/v1/files",
    tag = "Files",
    operation_id = "uploadFile",
    summary = "Upload a file",
    description = "Uploads a file from the `file` multipart field. Byte-identical content is \
        stored once: a re-upload of existing content creates a new logical file that shares \
        the stored bytes, reports `is_duplicate: true`, and names the original upload in \
        `duplicate_of`. An optional `size` field carries the client's advisory byte count.",
    request_body(content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 503, description = "Transient I/O failure (TRANSIENT_IO)", body = ErrorBody),
        (status = 507, description = "Storage exhausted (STORAGE_FULL)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut outcome: Option<IngestOutcome> = None;
    let mut declared_size: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field
                    .file_name()
                    .ok_or_else(|| {
                        AppError::Validation("File field must have a filename".into())
                    })?
                    .to_string();
                let filename = validate_filename(&filename)
                    .map_err(|e| AppError::Validation(e.message().into()))?
                    .to_string();
                let declared_file_type = field.content_type().map(|s| s.to_string());

                let meta = UploadMetadata {
                    original_filename: filename,
                    declared_file_type,
                    declared_size,
                };

                let stream = field.map_err(std::io::Error::other);
                let reader: BoxReader<'_> = Box::new(StreamReader::new(stream));
                outcome = Some(state.engine.ingest(reader, meta).await?);
            }
            Some("size") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read size: {e}")))?;
                declared_size = text.trim().parse::<i64>().ok();
            }
            _ => {} // Ignore unknown fields.
        }
    }

    let outcome = outcome.ok_or_else(|| AppError::Validation("Missing 'file' field".into()))?;

    Ok((StatusCode::CREATED, Json(UploadResponse::from(outcome))))
}

#[utoipa::path(
    get,
    path = "/api/v1/files",
    tag = "Files",
    operation_id = "listFiles",
    summary = "List files with filtering and search",
    description = "Returns a paginated file listing. Supports filtering by MIME type, size \
        range, and upload-time range, case-insensitive filename search, and sorting by \
        `uploaded_at` (default, desc), `original_filename`, `size`, or `file_type`.",
    params(FileListQuery),
    responses(
        (status = 200, description = "File list", body = FileListResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, query))]
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<FileListQuery>,
) -> Result<Json<FileListResponse>, AppError> {
    let filter = build_filter(query)?;
    let (rows, total) = state.engine.repository().list_files(&filter).await?;

    let per_page = filter.per_page.clamp(1, 100);
    let page = Ord::max(filter.page, 1);
    let data = rows
        .into_iter()
        .map(|(file_model, blob_model)| FileResponse::from_models(file_model, &blob_model))
        .collect();

    Ok(Json(FileListResponse {
        data,
        pagination: Pagination {
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        },
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}",
    tag = "Files",
    operation_id = "getFile",
    summary = "Get file metadata",
    params(("id" = String, Path, description = "Logical file ID (UUID)")),
    responses(
        (status = 200, description = "File metadata", body = FileResponse),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, AppError> {
    let id = parse_file_id(&id)?;
    let (file_model, blob_model) = state.engine.repository().find_file(id).await?;
    Ok(Json(FileResponse::from_models(file_model, &blob_model)))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/{id}/download",
    tag = "Files",
    operation_id = "downloadFile",
    summary = "Download file content",
    description = "Streams the file's bytes. Supports ETag-based caching via If-None-Match; \
        the ETag is the content hash, so it is shared by deduplicated files.",
    params(("id" = String, Path, description = "Logical file ID (UUID)")),
    responses(
        (status = 200, description = "File content"),
        (status = 304, description = "Not Modified (ETag match)"),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers), fields(id))]
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = parse_file_id(&id)?;
    let (file_model, blob_model, reader) = state.engine.open(id).await?;

    let etag_value = format!("\"{}\"", file_model.content_hash);
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH)
        && let Ok(val) = if_none_match.to_str()
        && (val == etag_value || val == "*")
    {
        return Ok(StatusCode::NOT_MODIFIED.into_response());
    }

    let stream = ReaderStream::new(reader);
    let body = Body::from_stream(stream);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &file_model.file_type)
        .header(header::CONTENT_LENGTH, blob_model.size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&file_model.original_filename),
        )
        .header(header::ETAG, &etag_value)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(body)
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/api/v1/files/{id}",
    tag = "Files",
    operation_id = "deleteFile",
    summary = "Delete a file",
    description = "Removes the logical file and decrements the reference count on its stored \
        content; the physical bytes are reclaimed when the last reference is removed.",
    params(("id" = String, Path, description = "Logical file ID (UUID)")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 400, description = "Invalid ID (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "File not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(id))]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_file_id(&id)?;
    state.engine.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/files/stats",
    tag = "Files",
    operation_id = "fileStats",
    summary = "Storage and deduplication statistics",
    responses(
        (status = 200, description = "Stats snapshot", body = StatsSnapshot),
    ),
)]
#[instrument(skip(state))]
pub async fn file_stats(
    State(state): State<AppState>,
) -> Result<Json<StatsSnapshot>, AppError> {
    Ok(Json(compute_stats(&state.db).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/files/types",
    tag = "Files",
    operation_id = "fileTypes",
    summary = "Distinct stored file types",
    responses(
        (status = 200, description = "File types", body = FileTypesResponse),
    ),
)]
#[instrument(skip(state))]
pub async fn file_types(
    State(state): State<AppState>,
) -> Result<Json<FileTypesResponse>, AppError> {
    let file_types = state.engine.repository().distinct_file_types().await?;
    Ok(Json(FileTypesResponse { file_types }))
}

fn parse_file_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::Validation("Invalid file ID".into()))
}

fn build_filter(query: FileListQuery) -> Result<FileFilter, AppError> {
    let sort_by = match query.sort_by.as_deref() {
        None | Some("uploaded_at") => FileSortBy::UploadedAt,
        Some("original_filename") => FileSortBy::OriginalFilename,
        Some("size") => FileSortBy::Size,
        Some("file_type") => FileSortBy::FileType,
        Some(_) => {
            return Err(AppError::Validation(
                "sort_by must be one of: uploaded_at, original_filename, size, file_type".into(),
            ));
        }
    };
    let ascending = match query.sort_order.as_deref() {
        Some("asc") => true,
        None | Some("desc") => false,
        Some(_) => {
            return Err(AppError::Validation(
                "sort_order must be 'asc' or 'desc'".into(),
            ));
        }
    };
    if let (Some(min), Some(max)) = (query.min_size, query.max_size)
        && min > max
    {
        return Err(AppError::Validation(
            "min_size must not exceed max_size".into(),
        ));
    }

    Ok(FileFilter {
        file_type: query.file_type,
        min_size: query.min_size,
        max_size: query.max_size,
        uploaded_after: query.uploaded_after,
        uploaded_before: query.uploaded_before,
        search: query.search,
        sort_by: Some(sort_by),
        ascending,
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    })
}

/// Build a safe `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    let ascii_name = if ascii_safe.is_empty() {
        "download".to_string()
    } else {
        ascii_safe
    };

    // RFC 5987 percent-encoding for filename*.
    let encoded: String = filename
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => String::from(b as char),
            _ => format!("%{b:02X}"),
        })
        .collect();

    format!("attachment; filename=\"{ascii_name}\"; filename*=UTF-8''{encoded}")
}
