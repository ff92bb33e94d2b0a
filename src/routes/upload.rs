use axum::{
    extract::{multipart::Multipart, Extension},
    routing::post,
    Json, Router,
};
use chrono::Local;
use serde_json::json;

use crate::{
    error::{bad, AppResult},
    state::StorageRoot,
    storage::store::store_file,
};

pub fn router() -> Router {
    Router::new().route("/upload", post(upload_file))
}

pub async fn upload_file(
    Extension(root): Extension<StorageRoot>,
    mut mp: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let Some(field) = mp.next_field().await.map_err(bad)? else {
        return Err(bad("No file uploaded"));
    };

    // keep only the final component; a crafted name must not leave the partition
    let original = field
        .file_name()
        .and_then(|n| n.rsplit(['/', '\\']).next())
        .filter(|n| !n.is_empty())
        .unwrap_or("unnamed")
        .to_owned();

    let stored = store_file(root.as_path(), Local::now(), &original, field).await?;

    Ok(Json(json!({
        "fileName": stored.storage_name,
        "url": stored.public_url,
        "originalName": original,
    })))
}
