use std::path::Path;

use axum::{
    extract::{Extension, Query},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::services::ServeDir;

use crate::{error::AppResult, state::StorageRoot, storage::list::list_dir};

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    path: String,
}

/// `/files/list` answers the file-manager listing; everything else under
/// `/files` falls through to static retrieval of stored blobs.
pub fn router(storage_root: &Path) -> Router {
    Router::new()
        .route("/list", get(list_files))
        .fallback_service(ServeDir::new(storage_root))
}

async fn list_files(
    Extension(root): Extension<StorageRoot>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let files = list_dir(root.as_path(), &q.path).await?;
    Ok(Json(json!({ "files": files })))
}
