use axum::{Router, routing::get};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().nest("/files", file_routes())
}

fn file_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::files::list_files).post(handlers::files::upload_file),
        )
        .route("/stats", get(handlers::files::file_stats))
        .route("/types", get(handlers::files::file_types))
        .route(
            "/{id}",
            get(handlers::files::get_file).delete(handlers::files::delete_file),
        )
        .route("/{id}/download", get(handlers::files::download_file))
        .layer(handlers::files::upload_body_limit())
}
