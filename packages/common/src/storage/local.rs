use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use super::error::StorageError;
use super::hash::{ContentHash, StreamHasher};
use super::traits::{BlobStore, BoxReader, StagedBlob};

/// Read buffer size for staging and streaming.
const CHUNK_SIZE: usize = 64 * 1024;

/// Filesystem-backed content-addressed blob store.
///
/// Committed blobs live in a Git-style sharded layout:
/// `{root}/{first 2 hex chars}/{remaining 62 hex chars}`.
/// Staged bytes are spooled under `{root}/.tmp/{uuid}` and only become
/// visible at their digest-keyed path via an atomic rename.
pub struct LocalBlobStore {
    root: PathBuf,
    max_size: u64,
}

/// Removes the temp file on drop unless disarmed; keeps an interrupted
/// staging pass (client disconnect, task cancellation) from leaking files.
struct TempGuard {
    path: PathBuf,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn disarm(self) -> PathBuf {
        let path = self.path.clone();
        std::mem::forget(self);
        path
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

impl LocalBlobStore {
    /// Open (or initialize) a blob store rooted at `root`.
    ///
    /// Creates the root and staging directories and sweeps any staging
    /// files orphaned by a previous crash.
    pub async fn new(root: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(&root).await?;
        let tmp_dir = root.join(".tmp");
        fs::create_dir_all(&tmp_dir).await?;

        let mut swept = 0usize;
        let mut entries = fs::read_dir(&tmp_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if fs::remove_file(entry.path()).await.is_ok() {
                swept += 1;
            }
        }
        if swept > 0 {
            debug!(swept, "removed orphaned staging files");
        }

        Ok(Self { root, max_size })
    }

    /// Filesystem path for a committed blob.
    fn blob_path(&self, digest: &ContentHash) -> PathBuf {
        self.root
            .join(digest.shard_prefix())
            .join(digest.shard_suffix())
    }

    /// Fresh path for a staging file.
    fn temp_path(&self) -> PathBuf {
        self.root
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn stage(&self, mut reader: BoxReader<'_>) -> Result<StagedBlob, StorageError> {
        let guard = TempGuard::new(self.temp_path());
        let mut temp_file = fs::File::create(&guard.path).await?;
        let mut hasher = StreamHasher::new();
        let mut buf = vec![0u8; CHUNK_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            if hasher.bytes_seen() > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: hasher.bytes_seen(),
                    limit: self.max_size,
                });
            }
            temp_file.write_all(&buf[..n]).await?;
        }
        temp_file.flush().await?;
        drop(temp_file);

        let (digest, size) = hasher.finish();
        Ok(StagedBlob::new(digest, size, guard.disarm()))
    }

    async fn commit(&self, staged: StagedBlob) -> Result<String, StorageError> {
        let digest = staged.digest();
        let location = digest.location_key();
        let blob_path = self.blob_path(&digest);

        // Concurrent upload of the same content already published it; the
        // bytes are identical by hash construction, keep theirs.
        if fs::try_exists(&blob_path).await? {
            staged.discard().await;
            return Ok(location);
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let Some(temp_path) = staged.into_temp_path() else {
            return Err(StorageError::Io(std::io::Error::other(
                "staged blob already consumed",
            )));
        };
        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(location)
    }

    async fn read(&self, digest: &ContentHash) -> Result<BoxReader<'static>, StorageError> {
        let blob_path = self.blob_path(digest);
        match fs::File::open(&blob_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(digest.to_hex()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, digest: &ContentHash) -> Result<bool, StorageError> {
        Ok(fs::try_exists(self.blob_path(digest)).await?)
    }

    async fn delete(&self, digest: &ContentHash) -> Result<bool, StorageError> {
        match fs::remove_file(self.blob_path(digest)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
