mod error;
mod hash;
mod traits;

pub mod local;

pub use error::StorageError;
pub use hash::{ContentHash, StreamHasher};
pub use traits::{BlobStore, BoxReader, StagedBlob};
