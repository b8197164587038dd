use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};

/// Connect, sync the entity schema, and create secondary indexes.
pub async fn init_db(db_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(db_url.to_owned());

    opt.max_connections(20)
        .min_connections(2)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.get_schema_registry("server::entity::*")
        .sync(&db)
        .await?;

    ensure_indexes(&db).await?;

    Ok(db)
}

/// Secondary indexes not derivable from the entity definitions.
///
/// `file.content_hash` backs the dedup lookup and the per-blob file scan;
/// `file.uploaded_at` backs the default listing order.
async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_file_content_hash ON \"file\" (content_hash)",
        "CREATE INDEX IF NOT EXISTS idx_file_uploaded_at ON \"file\" (uploaded_at)",
    ];

    for stmt in statements {
        db.execute_raw(Statement::from_string(
            db.get_database_backend(),
            stmt.to_string(),
        ))
        .await?;
    }

    Ok(())
}
