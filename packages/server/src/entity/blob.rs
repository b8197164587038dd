use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blob_object")]
pub struct Model {
    /// SHA-256 content hash, hex-encoded.
    #[sea_orm(primary_key, auto_increment = false)]
    pub content_hash: String,

    /// Physical size of the stored bytes.
    pub size: i64,

    /// Number of logical files currently referencing this blob.
    ///
    /// Mutated only through the repository's conditional
    /// increment/decrement statements; reaches 0 exactly once, at which
    /// point the row and the physical bytes are removed.
    pub reference_count: i32,

    /// Store-relative location key of the physical bytes.
    pub storage_location: String,

    /// Filename of the upload that created this blob, shown when later
    /// uploads deduplicate against it.
    pub original_filename: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub files: HasMany<super::file::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
