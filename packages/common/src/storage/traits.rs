use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::hash::ContentHash;

/// Type alias for a boxed async reader.
pub type BoxReader<'a> = Box<dyn AsyncRead + Unpin + Send + 'a>;

/// Handle to bytes spooled to temporary storage, awaiting commit or discard.
///
/// Produced by [`BlobStore::stage`], which hashes the stream while spooling
/// it, so the digest and observed size are already known. The handle owns
/// the temp file: dropping it without committing removes the file, which
/// covers request cancellation mid-upload.
pub struct StagedBlob {
    digest: ContentHash,
    size: u64,
    temp_path: Option<PathBuf>,
}

impl StagedBlob {
    pub(crate) fn new(digest: ContentHash, size: u64, temp_path: PathBuf) -> Self {
        Self {
            digest,
            size,
            temp_path: Some(temp_path),
        }
    }

    /// Digest of the staged bytes.
    pub fn digest(&self) -> ContentHash {
        self.digest
    }

    /// Number of bytes staged.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Detach the temp path so commit can rename it; skips the Drop cleanup.
    pub(crate) fn into_temp_path(mut self) -> Option<PathBuf> {
        self.temp_path.take()
    }

    /// Remove the staged temp file without committing.
    pub async fn discard(mut self) {
        if let Some(path) = self.temp_path.take() {
            let _ = tokio::fs::remove_file(&path).await;
        }
    }
}

impl Drop for StagedBlob {
    fn drop(&mut self) {
        if let Some(path) = self.temp_path.take() {
            let _ = std::fs::remove_file(&path);
        }
    }
}

/// Content-addressed blob storage with a stage/commit protocol.
///
/// Staging spools an incoming stream to a temporary location while hashing
/// it in the same pass; commit atomically publishes the bytes under their
/// digest-keyed permanent location. Commit and delete are both idempotent
/// so races between concurrent uploads of identical content, and crashes
/// between a reference-count update and the physical delete, are safe to
/// retry.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Spool a stream to temporary storage, hashing it in the same pass.
    async fn stage(&self, reader: BoxReader<'_>) -> Result<StagedBlob, StorageError>;

    /// Atomically move staged bytes into their digest-keyed location.
    ///
    /// Idempotent: if the location is already occupied (a concurrent upload
    /// of the same content committed first), the staged copy is discarded
    /// and the existing location returned. Returns the store-relative
    /// location key.
    async fn commit(&self, staged: StagedBlob) -> Result<String, StorageError>;

    /// Open a streaming reader over a committed blob.
    async fn read(&self, digest: &ContentHash) -> Result<BoxReader<'static>, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, digest: &ContentHash) -> Result<bool, StorageError>;

    /// Delete a committed blob.
    ///
    /// Returns `true` if bytes were removed, `false` if already gone.
    async fn delete(&self, digest: &ContentHash) -> Result<bool, StorageError>;

    /// Stage and commit an in-memory buffer in one step.
    async fn put(&self, data: &[u8]) -> Result<(ContentHash, String), StorageError> {
        let reader: BoxReader<'_> = Box::new(Cursor::new(data));
        let staged = self.stage(reader).await?;
        let digest = staged.digest();
        let location = self.commit(staged).await?;
        Ok((digest, location))
    }

    /// Read a whole blob into memory.
    async fn get(&self, digest: &ContentHash) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.read(digest).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }
}
