use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common::storage::local::LocalBlobStore;
use tracing::{Level, info};

use server::config::AppConfig;
use server::database;
use server::dedup::DedupEngine;
use server::repository::FileRepository;
use server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = database::init_db(&config.database.url)
        .await
        .context("Failed to initialize database")?;

    let blob_store = Arc::new(
        LocalBlobStore::new(
            config.storage.root.clone().into(),
            config.storage.max_file_size,
        )
        .await
        .context("Failed to open blob store")?,
    );

    let engine = DedupEngine::new(blob_store.clone(), FileRepository::new(db.clone()));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let state = AppState {
        db,
        blob_store,
        engine,
        config,
    };

    let app = server::build_router(state);

    info!("Vault listening at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
