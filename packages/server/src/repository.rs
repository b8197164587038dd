use chrono::{DateTime, Utc};
use common::storage::ContentHash;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{ExprTrait, Func, LikeExpr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::entity::{blob, file};
use crate::error::AppError;
use crate::models::shared::escape_like;

/// Metadata recorded for one logical file.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub original_filename: String,
    pub file_type: String,
}

/// Result of attempting to create a blob together with its first file.
pub enum CreateOutcome {
    Created(file::Model),
    /// A concurrent upload created the blob between lookup and insert;
    /// the caller retries as an increment.
    AlreadyExists,
}

/// Returned by [`FileRepository::delete_file`] so the caller can decide
/// whether physical cleanup is needed.
pub struct DeletedFile {
    pub content_hash: String,
    pub storage_location: String,
    pub size: i64,
    /// Reference count after the decrement; 0 means the blob row is gone
    /// and the physical bytes should be reclaimed.
    pub remaining_refs: i32,
}

/// Sort keys accepted by [`FileRepository::list_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSortBy {
    UploadedAt,
    OriginalFilename,
    Size,
    FileType,
}

/// Filter and paging criteria for listing files.
#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    /// Case-insensitive exact match on the MIME type.
    pub file_type: Option<String>,
    pub min_size: Option<i64>,
    pub max_size: Option<i64>,
    pub uploaded_after: Option<DateTime<Utc>>,
    pub uploaded_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring match on the original filename.
    pub search: Option<String>,
    pub sort_by: Option<FileSortBy>,
    pub ascending: bool,
    pub page: u64,
    pub per_page: u64,
}

/// Persistence layer for logical files and blob records.
///
/// Every operation that touches `reference_count` runs as a single
/// conditional statement or inside one transaction; no caller ever
/// reads-then-writes the count across separate calls. That keeps the
/// invariant `reference_count == number of referencing files` under
/// concurrent uploads and deletes without any engine-level locking.
#[derive(Clone)]
pub struct FileRepository {
    db: DatabaseConnection,
}

impl FileRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_blob(&self, digest: &ContentHash) -> Result<Option<blob::Model>, AppError> {
        Ok(blob::Entity::find_by_id(digest.to_hex())
            .one(&self.db)
            .await?)
    }

    /// Create a blob with `reference_count = 1` and its first logical file
    /// in one atomic unit.
    ///
    /// If a concurrent caller created a blob with this digest between the
    /// engine's lookup and this call, the unique constraint on
    /// `content_hash` detects the conflict and the transaction is rolled
    /// back with no side effects.
    pub async fn create_blob_and_file(
        &self,
        digest: &ContentHash,
        size: i64,
        storage_location: &str,
        record: &FileRecord,
    ) -> Result<CreateOutcome, AppError> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let new_blob = blob::ActiveModel {
            content_hash: Set(digest.to_hex()),
            size: Set(size),
            reference_count: Set(1),
            storage_location: Set(storage_location.to_string()),
            original_filename: Set(record.original_filename.clone()),
            created_at: Set(now),
        };
        let inserted = blob::Entity::insert(new_blob)
            .on_conflict(
                OnConflict::column(blob::Column::ContentHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await;

        match inserted {
            Ok(0) | Err(DbErr::RecordNotInserted) => {
                txn.rollback().await?;
                return Ok(CreateOutcome::AlreadyExists);
            }
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }

        let model = insert_file(&txn, digest, size, record, false, now).await?;
        txn.commit().await?;
        Ok(CreateOutcome::Created(model))
    }

    /// Atomically increment the blob's reference count and create a new
    /// logical file pointing at it.
    ///
    /// Returns `None` when no blob with this digest exists any more (a
    /// concurrent delete drove it to zero between lookup and increment);
    /// the caller falls back to the create path.
    pub async fn increment_and_create_file(
        &self,
        digest: &ContentHash,
        record: &FileRecord,
    ) -> Result<Option<(file::Model, blob::Model)>, AppError> {
        let txn = self.db.begin().await?;

        let touched = blob::Entity::update_many()
            .col_expr(
                blob::Column::ReferenceCount,
                Expr::col(blob::Column::ReferenceCount).add(1),
            )
            .filter(blob::Column::ContentHash.eq(digest.to_hex()))
            .exec(&txn)
            .await?;
        if touched.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        let blob_model = blob::Entity::find_by_id(digest.to_hex())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!("blob {digest} vanished mid-transaction"))
            })?;

        let file_model =
            insert_file(&txn, digest, blob_model.size, record, true, Utc::now()).await?;
        txn.commit().await?;
        Ok(Some((file_model, blob_model)))
    }

    /// Delete a logical file and decrement its blob's reference count in
    /// one atomic unit; removes the blob row when the count reaches 0.
    pub async fn delete_file(&self, id: Uuid) -> Result<DeletedFile, AppError> {
        let txn = self.db.begin().await?;

        let Some(file_model) = file::Entity::find_by_id(id).one(&txn).await? else {
            txn.rollback().await?;
            return Err(AppError::NotFound("File not found".into()));
        };

        file::Entity::delete_by_id(id).exec(&txn).await?;

        // Conditional decrement; touching zero rows means the count was
        // already 0 or the blob row is missing, either of which breaks the
        // reference-count invariant.
        let touched = blob::Entity::update_many()
            .col_expr(
                blob::Column::ReferenceCount,
                Expr::col(blob::Column::ReferenceCount).sub(1),
            )
            .filter(blob::Column::ContentHash.eq(file_model.content_hash.clone()))
            .filter(blob::Column::ReferenceCount.gt(0))
            .exec(&txn)
            .await?;
        if touched.rows_affected == 0 {
            txn.rollback().await?;
            return Err(AppError::Internal(format!(
                "reference count underflow for blob {}",
                file_model.content_hash
            )));
        }

        let blob_model = blob::Entity::find_by_id(file_model.content_hash.clone())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "blob {} missing after decrement",
                    file_model.content_hash
                ))
            })?;

        let remaining = blob_model.reference_count;
        if remaining == 0 {
            blob::Entity::delete_by_id(blob_model.content_hash.clone())
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(DeletedFile {
            content_hash: file_model.content_hash,
            storage_location: blob_model.storage_location,
            size: blob_model.size,
            remaining_refs: remaining,
        })
    }

    pub async fn find_file(&self, id: Uuid) -> Result<(file::Model, blob::Model), AppError> {
        let row = file::Entity::find_by_id(id)
            .find_also_related(blob::Entity)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("File not found".into()))?;

        require_blob(row)
    }

    /// List files matching the filter, newest first by default, together
    /// with their blob records and the total match count.
    pub async fn list_files(
        &self,
        filter: &FileFilter,
    ) -> Result<(Vec<(file::Model, blob::Model)>, u64), AppError> {
        let cond = build_condition(filter);
        let page = Ord::max(filter.page, 1);
        let per_page = filter.per_page.clamp(1, 100);

        let total = file::Entity::find()
            .filter(cond.clone())
            .count(&self.db)
            .await?;

        let (sort_column, sort_order) = sort_key(filter);
        let rows = file::Entity::find()
            .filter(cond)
            .find_also_related(blob::Entity)
            .order_by(sort_column, sort_order)
            .offset(Some((page - 1) * per_page))
            .limit(Some(per_page))
            .all(&self.db)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(require_blob(row)?);
        }
        Ok((out, total))
    }

    /// Distinct MIME types currently stored, for filter dropdowns.
    pub async fn distinct_file_types(&self) -> Result<Vec<String>, AppError> {
        Ok(file::Entity::find()
            .select_only()
            .column(file::Column::FileType)
            .distinct()
            .order_by_asc(file::Column::FileType)
            .into_tuple::<String>()
            .all(&self.db)
            .await?)
    }
}

/// A file row without its blob row violates the ownership invariant.
fn require_blob(
    row: (file::Model, Option<blob::Model>),
) -> Result<(file::Model, blob::Model), AppError> {
    let (file_model, blob_model) = row;
    let blob_model = blob_model.ok_or_else(|| {
        AppError::Internal(format!(
            "file {} references missing blob {}",
            file_model.id, file_model.content_hash
        ))
    })?;
    Ok((file_model, blob_model))
}

async fn insert_file<C: ConnectionTrait>(
    conn: &C,
    digest: &ContentHash,
    size: i64,
    record: &FileRecord,
    is_duplicate: bool,
    uploaded_at: DateTime<Utc>,
) -> Result<file::Model, AppError> {
    let model = file::ActiveModel {
        id: Set(Uuid::now_v7()),
        original_filename: Set(record.original_filename.clone()),
        file_type: Set(record.file_type.clone()),
        size: Set(size),
        uploaded_at: Set(uploaded_at),
        content_hash: Set(digest.to_hex()),
        is_duplicate: Set(is_duplicate),
    };
    Ok(model.insert(conn).await?)
}

fn build_condition(filter: &FileFilter) -> Condition {
    let mut cond = Condition::all();

    if let Some(ref file_type) = filter.file_type {
        cond = cond.add(
            Expr::expr(Func::lower(Expr::col(file::Column::FileType)))
                .eq(file_type.trim().to_lowercase()),
        );
    }
    if let Some(min) = filter.min_size {
        cond = cond.add(file::Column::Size.gte(min));
    }
    if let Some(max) = filter.max_size {
        cond = cond.add(file::Column::Size.lte(max));
    }
    if let Some(after) = filter.uploaded_after {
        cond = cond.add(file::Column::UploadedAt.gte(after));
    }
    if let Some(before) = filter.uploaded_before {
        cond = cond.add(file::Column::UploadedAt.lte(before));
    }
    if let Some(ref search) = filter.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            cond = cond.add(
                Expr::expr(Func::lower(Expr::col(file::Column::OriginalFilename)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    cond
}

fn sort_key(filter: &FileFilter) -> (file::Column, Order) {
    let column = match filter.sort_by.unwrap_or(FileSortBy::UploadedAt) {
        FileSortBy::UploadedAt => file::Column::UploadedAt,
        FileSortBy::OriginalFilename => file::Column::OriginalFilename,
        FileSortBy::Size => file::Column::Size,
        FileSortBy::FileType => file::Column::FileType,
    };
    let order = if filter.ascending {
        Order::Asc
    } else {
        Order::Desc
    };
    (column, order)
}
