use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::stores::Snapshot;

// ============================================================================
// Snapshot Cache - last known store state on disk
// ============================================================================
//
// One JSON file per store under the cache directory. A save never replaces a
// file holding a newer snapshot (compared by `updated_at`), so a late flush
// from a stale context cannot roll the cache back.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

#[derive(Deserialize)]
struct CachedHeader {
    updated_at: Option<DateTime<Utc>>,
}

impl SnapshotCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Write `snapshot` unless the cached copy is newer. Returns whether it wrote.
    pub async fn save<T: Serialize + Clone>(&self, name: &str, snapshot: &Snapshot<T>) -> anyhow::Result<bool> {
        let Some(updated_at) = snapshot.updated_at else {
            return Ok(false);
        };

        let path = self.path(name);
        if let Some(cached_at) = self.cached_at(&path).await? {
            if cached_at > updated_at {
                tracing::debug!(store = name, %cached_at, %updated_at, "Cached snapshot is newer, skipping save");
                return Ok(false);
            }
        }

        let clean = Snapshot {
            data: snapshot.data.clone(),
            is_loading: false,
            error: None,
            version: snapshot.version,
            updated_at: snapshot.updated_at,
        };
        let bytes = serde_json::to_vec_pretty(&clean)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating cache dir {}", self.dir.display()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;

        tracing::debug!(store = name, path = %path.display(), "Snapshot saved");
        Ok(true)
    }

    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> anyhow::Result<Option<Snapshot<T>>> {
        let path = self.path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
        };

        let snapshot = serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(snapshot))
    }

    async fn cached_at(&self, path: &Path) -> anyhow::Result<Option<DateTime<Utc>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<CachedHeader>(&bytes) {
                Ok(header) => Ok(header.updated_at),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "Unreadable cached snapshot, overwriting");
                    Ok(None)
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(data: Vec<u32>, updated_at: DateTime<Utc>) -> Snapshot<Vec<u32>> {
        Snapshot {
            data,
            is_loading: true,
            error: Some("stale error".to_string()),
            version: 3,
            updated_at: Some(updated_at),
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        assert!(cache.save("orders", &snapshot(vec![1, 2], Utc::now())).await.unwrap());

        let loaded: Snapshot<Vec<u32>> = cache.load("orders").await.unwrap().unwrap();
        assert_eq!(loaded.data, vec![1, 2]);
        assert!(!loaded.is_loading);
        assert!(loaded.error.is_none());
    }

    #[tokio::test]
    async fn test_older_snapshot_does_not_overwrite_newer() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());
        let now = Utc::now();

        cache.save("address", &snapshot(vec![2], now)).await.unwrap();
        let written = cache
            .save("address", &snapshot(vec![1], now - Duration::minutes(5)))
            .await
            .unwrap();

        assert!(!written);
        let loaded: Snapshot<Vec<u32>> = cache.load("address").await.unwrap().unwrap();
        assert_eq!(loaded.data, vec![2]);
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path().join("nested"));

        let loaded: Option<Snapshot<Vec<u32>>> = cache.load("catalog").await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_never_fetched_snapshot_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new(dir.path());

        let empty: Snapshot<Vec<u32>> = Snapshot::default();
        assert!(!cache.save("notification", &empty).await.unwrap());
    }
}
