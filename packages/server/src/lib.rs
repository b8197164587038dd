pub mod config;
pub mod database;
pub mod dedup;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod state;
pub mod stats;
pub mod utils;

use std::time::Duration;

use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vault File Storage API",
        version = "1.0.0",
        description = "Content-addressed file storage with whole-file deduplication. \
            Identical uploads share one physical copy behind a reference count; bytes are \
            reclaimed when the last reference is deleted."
    ),
    paths(
        handlers::files::upload_file,
        handlers::files::list_files,
        handlers::files::get_file,
        handlers::files::download_file,
        handlers::files::delete_file,
        handlers::files::file_stats,
        handlers::files::file_types,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::models::file::FileResponse,
        crate::models::file::UploadResponse,
        crate::models::file::FileListResponse,
        crate::models::file::FileTypesResponse,
        crate::models::shared::Pagination,
        crate::stats::StatsSnapshot,
        crate::stats::TypeCount,
        crate::stats::SizeRange,
    )),
    tags(
        (name = "Files", description = "Upload, listing, download, deletion, and storage statistics")
    )
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = cors_layer(&state.config.server.cors);

    axum::Router::new()
        .nest("/api", routes::api_routes())
        .layer(cors)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(cfg.max_age));

    if cfg.allow_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allow_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
