use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;

use super::paths::resolve;
use crate::error::{io, AppResult};

/// One direct child of a listed directory. Produced on demand, never cached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
    /// Meaningful only for plain files.
    pub size: u64,
    pub modified_time: DateTime<Utc>,
}

/// Lists the direct children of `requested` under `root`.
///
/// Path escapes are rejected exactly as the resolver rejects them. Order is a
/// user-facing contract: directories first, then files, each group sorted by
/// name case-insensitively. The file-manager UI renders this order verbatim.
pub async fn list_dir(root: &Path, requested: &str) -> AppResult<Vec<FileEntry>> {
    let target = resolve(root, requested)?;

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(&target).await.map_err(io)?;
    while let Some(entry) = dir.next_entry().await.map_err(io)? {
        let meta = entry.metadata().await.map_err(io)?;
        entries.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_directory: meta.is_dir(),
            size: meta.len(),
            modified_time: meta.modified().map_err(io)?.into(),
        });
    }

    entries.sort_by(|a, b| {
        b.is_directory
            .cmp(&a.is_directory)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then_with(|| a.name.cmp(&b.name))
    });
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn directories_sort_before_files_then_by_name() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), b"b").await.unwrap();
        fs::create_dir(tmp.path().join("A")).await.unwrap();
        fs::write(tmp.path().join("a.txt"), b"a").await.unwrap();

        let names: Vec<_> = list_dir(tmp.path(), "")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, ["A", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn reads_direct_children_only() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sub/deep")).await.unwrap();
        fs::write(tmp.path().join("sub/deep/x.txt"), b"x").await.unwrap();
        fs::write(tmp.path().join("sub/y.txt"), b"y").await.unwrap();

        let top: Vec<_> = list_dir(tmp.path(), "")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(top, ["sub"]);

        let inner: Vec<_> = list_dir(tmp.path(), "sub")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(inner, ["deep", "y.txt"]);
    }

    #[tokio::test]
    async fn reports_file_size() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("f.bin"), vec![0u8; 42]).await.unwrap();

        let entries = list_dir(tmp.path(), "").await.unwrap();
        assert_eq!(entries[0].size, 42);
        assert!(!entries[0].is_directory);
    }

    #[tokio::test]
    async fn escape_is_rejected_before_touching_the_fs() {
        let tmp = tempfile::tempdir().unwrap();
        let err = list_dir(tmp.path(), "../..").await.unwrap_err();
        assert!(matches!(err, crate::error::AppErr::Forbidden));
    }
}
