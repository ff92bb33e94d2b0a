use std::fmt::Display;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Local};
use futures_util::{Stream, StreamExt};
use tokio::{fs::File, io::AsyncWriteExt};

use super::partition::ensure_partition;
use crate::error::{bad, io, AppResult};

/// Outcome of a successful upload. Immutable once written; there is no
/// delete API.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// `<epoch-ms>-<originalName>`, unique per request.
    pub storage_name: String,
    /// Partition the blob landed in, `YYYY/MM/DD`.
    pub partition_path: String,
    /// URL the blob is served back under.
    pub public_url: String,
}

/// Streams an uploaded blob into the current date partition.
///
/// The millisecond timestamp prefix keeps same-instant collisions out while
/// the original name stays visible for display. Names are unique per request,
/// so writing the final path directly never exposes a partial file under a
/// name a reader could already know.
pub async fn store_file<S, E>(
    root: &Path,
    now: DateTime<Local>,
    original_name: &str,
    mut chunks: S,
) -> AppResult<StoredFile>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let partition = ensure_partition(root, now).await.map_err(io)?;

    let storage_name = format!("{}-{}", now.timestamp_millis(), original_name);
    let full = partition.abs.join(&storage_name);

    let mut file = File::create(&full).await.map_err(io)?;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(bad)?;
        file.write_all(&chunk).await.map_err(io)?;
    }
    file.flush().await.map_err(io)?;

    // forward slashes regardless of host OS
    let public_url = format!("/files/{}/{}", partition.rel, storage_name);
    tracing::info!(%public_url, "stored upload");

    Ok(StoredFile {
        storage_name,
        partition_path: partition.rel,
        public_url,
    })
}
