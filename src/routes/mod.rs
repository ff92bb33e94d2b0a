use std::path::Path;

use axum::Router;

pub mod files;
pub mod upload;
pub mod ws;

pub fn router(storage_root: &Path) -> Router {
    Router::new()
        .merge(upload::router())
        .merge(ws::router())
        .nest("/files", files::router(storage_root))
}
