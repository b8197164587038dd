use std::sync::Arc;

use common::storage::{BlobStore, BoxReader, ContentHash};
use tracing::{info, warn};
use uuid::Uuid;

use crate::entity::{blob, file};
use crate::error::AppError;
use crate::repository::{CreateOutcome, FileRecord, FileRepository};

/// Claimed metadata accompanying an upload stream.
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub original_filename: String,
    pub declared_file_type: Option<String>,
    /// Advisory size claim from the transport; logged on mismatch, never
    /// trusted for storage accounting.
    pub declared_size: Option<i64>,
}

/// Result of ingesting one upload.
pub struct IngestOutcome {
    pub file: file::Model,
    pub reference_count: i32,
    pub is_duplicate: bool,
    /// Bytes not re-written because identical content was already stored.
    pub storage_saved: i64,
    /// First-known filename of the existing content, for user-facing
    /// duplicate messaging.
    pub duplicate_of: Option<String>,
}

/// Orchestrates upload, delete, and download against the blob store and
/// the file record repository.
///
/// An upload is staged (hashed and spooled in a single pass) and then
/// either committed as a novel blob or folded into an existing one as a
/// reference-count increment. Both races on the digest — losing the blob
/// create to a concurrent identical upload, and the blob being deleted
/// between lookup and increment — are recovered internally by switching
/// to the other path.
#[derive(Clone)]
pub struct DedupEngine {
    store: Arc<dyn BlobStore>,
    repo: FileRepository,
}

impl DedupEngine {
    pub fn new(store: Arc<dyn BlobStore>, repo: FileRepository) -> Self {
        Self { store, repo }
    }

    pub async fn ingest(
        &self,
        stream: BoxReader<'_>,
        meta: UploadMetadata,
    ) -> Result<IngestOutcome, AppError> {
        let staged = self.store.stage(stream).await?;
        if staged.size() == 0 {
            staged.discard().await;
            return Err(AppError::Validation(
                "Empty file upload is not allowed".into(),
            ));
        }
        if let Some(declared) = meta.declared_size
            && declared != staged.size() as i64
        {
            warn!(
                declared,
                received = staged.size(),
                filename = %meta.original_filename,
                "declared size differs from received bytes"
            );
        }

        let digest = staged.digest();
        let size = staged.size() as i64;
        let record = FileRecord {
            file_type: resolve_file_type(meta.declared_file_type, &meta.original_filename),
            original_filename: meta.original_filename,
        };

        // A dropped `staged` (any early error return below) removes the
        // temp file, so no orphan survives a failed ingest.
        let mut staged = Some(staged);
        let mut committed: Option<String> = None;

        // Each digest race can be lost at most once: the create race to
        // exactly one concurrent creator, the increment race to a delete
        // that drove the count to zero.
        for _ in 0..3 {
            if self.repo.find_blob(&digest).await?.is_some() {
                if let Some((file_model, blob_model)) =
                    self.repo.increment_and_create_file(&digest, &record).await?
                {
                    if let Some(staged) = staged.take() {
                        staged.discard().await;
                    }
                    info!(
                        digest = %digest,
                        saved = blob_model.size,
                        "deduplicated upload"
                    );
                    return Ok(IngestOutcome {
                        file: file_model,
                        reference_count: blob_model.reference_count,
                        is_duplicate: true,
                        storage_saved: blob_model.size,
                        duplicate_of: Some(blob_model.original_filename),
                    });
                }
                // Blob deleted between lookup and increment; retry as create.
                continue;
            }

            let location = match staged.take() {
                Some(staged) => {
                    let location = self.store.commit(staged).await?;
                    committed = Some(location.clone());
                    location
                }
                None => {
                    let Some(location) = committed.clone() else {
                        return Err(AppError::Internal(format!(
                            "staged bytes for {digest} lost before commit"
                        )));
                    };
                    // Bytes were committed on an earlier attempt; a
                    // concurrent delete may have reclaimed them since.
                    if !self.store.exists(&digest).await? {
                        return Err(AppError::TransientIo(format!(
                            "blob {digest} reclaimed mid-upload, resubmit"
                        )));
                    }
                    location
                }
            };

            match self
                .repo
                .create_blob_and_file(&digest, size, &location, &record)
                .await?
            {
                CreateOutcome::Created(file_model) => {
                    info!(digest = %digest, size, "stored new blob");
                    return Ok(IngestOutcome {
                        file: file_model,
                        reference_count: 1,
                        is_duplicate: false,
                        storage_saved: 0,
                        duplicate_of: None,
                    });
                }
                CreateOutcome::AlreadyExists => continue,
            }
        }

        Err(AppError::Internal(format!(
            "gave up ingesting {digest} after repeated digest races"
        )))
    }

    /// Delete a logical file; reclaims the physical bytes when the last
    /// reference goes away.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let deleted = self.repo.delete_file(id).await?;
        if deleted.remaining_refs == 0 {
            let digest = ContentHash::from_hex(&deleted.content_hash)?;
            // Idempotent delete: a crash after the row update and before
            // the unlink leaves a retryable orphan, never a dangling row.
            self.store.delete(&digest).await?;
            info!(
                digest = %deleted.content_hash,
                bytes = deleted.size,
                "reclaimed blob storage"
            );
        }
        Ok(())
    }

    /// Open a logical file's content for download.
    pub async fn open(
        &self,
        id: Uuid,
    ) -> Result<(file::Model, blob::Model, BoxReader<'static>), AppError> {
        let (file_model, blob_model) = self.repo.find_file(id).await?;
        let digest = ContentHash::from_hex(&file_model.content_hash)?;
        let reader = self.store.read(&digest).await?;
        Ok((file_model, blob_model, reader))
    }

    pub fn repository(&self) -> &FileRepository {
        &self.repo
    }
}

/// Declared MIME type if present, otherwise a guess from the filename
/// extension, otherwise the octet-stream fallback.
fn resolve_file_type(declared: Option<String>, filename: &str) -> String {
    declared
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(filename)
                .first()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string())
        })
}
