use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Filename as supplied by the uploader.
    pub original_filename: String,

    /// MIME content type (declared, or guessed from the filename).
    pub file_type: String,

    /// Byte count measured while staging; equals the blob's physical size.
    pub size: i64,

    pub uploaded_at: DateTimeUtc,

    pub content_hash: String,

    #[sea_orm(belongs_to, from = "content_hash", to = "content_hash")]
    pub blob: BelongsTo<super::blob::Entity>,

    /// Whether this upload was served by an already-stored blob.
    pub is_duplicate: bool,
}

impl ActiveModelBehavior for ActiveModel {}
