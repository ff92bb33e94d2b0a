use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local};
use tokio::fs;

/// A year/month/day directory under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Absolute path, for writing.
    pub abs: PathBuf,
    /// `YYYY/MM/DD`, forward slashes, for building public URLs.
    pub rel: String,
}

/// Creates (if missing) and returns the partition for `now`. The clock is an
/// explicit input; callers pass `Local::now()` in production. Creation is
/// idempotent, so two calls within the same day return the same partition.
pub async fn ensure_partition(root: &Path, now: DateTime<Local>) -> std::io::Result<Partition> {
    let rel = format!("{:04}/{:02}/{:02}", now.year(), now.month(), now.day());
    let abs = root
        .join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()));
    fs::create_dir_all(&abs).await?;
    Ok(Partition { abs, rel })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn creates_zero_padded_levels() {
        let tmp = tempfile::tempdir().unwrap();
        let p = ensure_partition(tmp.path(), day(2023, 1, 5)).await.unwrap();
        assert_eq!(p.rel, "2023/01/05");
        assert_eq!(p.abs, tmp.path().join("2023").join("01").join("05"));
        assert!(p.abs.is_dir());
    }

    #[tokio::test]
    async fn second_call_same_day_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let t = day(2023, 11, 14);
        let first = ensure_partition(tmp.path(), t).await.unwrap();
        let second = ensure_partition(tmp.path(), t).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn different_days_get_different_partitions() {
        let tmp = tempfile::tempdir().unwrap();
        let a = ensure_partition(tmp.path(), day(2023, 11, 14)).await.unwrap();
        let b = ensure_partition(tmp.path(), day(2023, 11, 15)).await.unwrap();
        assert_ne!(a.rel, b.rel);
        assert!(a.abs.is_dir() && b.abs.is_dir());
    }
}
