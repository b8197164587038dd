use sea_orm::sea_query::{Alias, Expr, ExprTrait};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Order, PaginatorTrait,
    QueryOrder, QuerySelect,
};
use serde::Serialize;

use crate::entity::{blob, file};
use crate::error::AppError;

/// Per-type file count in the stats breakdown.
#[derive(Serialize, FromQueryResult, utoipa::ToSchema)]
pub struct TypeCount {
    /// MIME content type.
    #[schema(example = "image/png")]
    pub file_type: String,
    #[schema(example = 12)]
    pub count: i64,
}

/// Smallest and largest logical file size, for filter sliders.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SizeRange {
    pub min: i64,
    pub max: i64,
}

/// Storage and deduplication statistics.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StatsSnapshot {
    /// Count of all logical files.
    pub total_files: i64,
    /// Count of unique blobs (distinct content).
    pub unique_files: i64,
    /// `total_files - unique_files`.
    pub duplicate_files: i64,
    /// Sum of logical file sizes.
    pub total_size: i64,
    /// Sum of physical blob sizes (each blob counted once).
    pub actual_size: i64,
    /// `total_size - actual_size`; never negative.
    pub storage_saved: i64,
    /// `storage_saved / total_size * 100`, 0 when nothing is stored.
    pub storage_saved_percentage: f64,
    /// File counts grouped by MIME type, most common first.
    pub file_types: Vec<TypeCount>,
    pub size_range: SizeRange,
}

/// Compute the stats snapshot by scanning the repository tables.
///
/// Sums are cast to BIGINT in SQL so both Postgres (where `SUM(bigint)`
/// widens to numeric) and SQLite decode as `i64`.
pub async fn compute_stats(db: &DatabaseConnection) -> Result<StatsSnapshot, AppError> {
    let total_files = file::Entity::find().count(db).await? as i64;
    let unique_files = blob::Entity::find().count(db).await? as i64;

    let total_size: i64 = file::Entity::find()
        .select_only()
        .column_as(
            file::Column::Size.sum().cast_as(Alias::new("BIGINT")),
            "total",
        )
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten()
        .unwrap_or(0);
    let actual_size: i64 = blob::Entity::find()
        .select_only()
        .column_as(
            blob::Column::Size.sum().cast_as(Alias::new("BIGINT")),
            "total",
        )
        .into_tuple::<Option<i64>>()
        .one(db)
        .await?
        .flatten()
        .unwrap_or(0);

    let storage_saved = total_size - actual_size;
    let storage_saved_percentage = if total_size > 0 {
        storage_saved as f64 / total_size as f64 * 100.0
    } else {
        0.0
    };

    let file_types = file::Entity::find()
        .select_only()
        .column(file::Column::FileType)
        .column_as(file::Column::Id.count(), "count")
        .group_by(file::Column::FileType)
        .order_by(Expr::col(Alias::new("count")), Order::Desc)
        .order_by_asc(file::Column::FileType)
        .into_model::<TypeCount>()
        .all(db)
        .await?;

    let (min, max): (Option<i64>, Option<i64>) = file::Entity::find()
        .select_only()
        .column_as(file::Column::Size.min(), "min")
        .column_as(file::Column::Size.max(), "max")
        .into_tuple()
        .one(db)
        .await?
        .unwrap_or((None, None));

    Ok(StatsSnapshot {
        total_files,
        unique_files,
        duplicate_files: total_files - unique_files,
        total_size,
        actual_size,
        storage_saved,
        storage_saved_percentage,
        file_types,
        size_range: SizeRange {
            min: min.unwrap_or(0),
            max: max.unwrap_or(0),
        },
    })
}
