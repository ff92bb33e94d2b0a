mod error;
mod presence;
mod relay;
mod routes;
mod state;
mod storage;

use std::{path::PathBuf, sync::Arc};

use axum::{extract::DefaultBodyLimit, Extension};
use tokio::sync::{broadcast, Mutex};
use tower_http::limit::RequestBodyLimitLayer;

use crate::relay::Relay;
use crate::state::{SharedRelay, StorageRoot};
use error::AppErr;

const BODY_LIMIT: usize = 100 * 1024 * 1024;
const BROADCAST_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<(), AppErr> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let root = PathBuf::from(std::env::var("STORAGE_ROOT").unwrap_or_else(|_| "files".into()));
    tokio::fs::create_dir_all(&root).await?;
    let root: StorageRoot = Arc::new(root);

    let relay: SharedRelay = Arc::new(Mutex::new(Relay::default()));
    let (tx, _) = broadcast::channel::<String>(BROADCAST_CAPACITY);

    let app = routes::router(root.as_path())
        .layer(Extension(relay))
        .layer(Extension(tx))
        .layer(Extension(root))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "chat relay listening");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
