//! Artifact directory with oldest-first retention

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use log::{debug, warn};

use crate::Result;

/// Writable location for generated images
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    max_files: usize,
}

impl ArtifactStore {
    /// Create the store, making sure the directory exists.
    pub fn new(dir: impl Into<PathBuf>, max_files: usize) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, max_files })
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Whether an artifact still exists (it may have been evicted).
    pub async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    /// Delete the oldest files until at most `max_files` remain.
    ///
    /// A `max_files` of 0 disables eviction.
    pub async fn enforce_retention(&self) -> Result<usize> {
        if self.max_files == 0 {
            return Ok(0);
        }

        let mut files: Vec<(SystemTime, PathBuf)> = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, entry.path()));
        }

        if files.len() <= self.max_files {
            return Ok(0);
        }

        files.sort();
        let excess = files.len() - self.max_files;
        let mut removed = 0;
        for (_, path) in files.into_iter().take(excess) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!("Evicted artifact {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to evict artifact {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn retention_removes_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), 2).unwrap();

        for name in ["a.png", "b.png", "c.png"] {
            std::fs::write(store.path_for(name), b"img").unwrap();
            // mtime resolution on some filesystems is coarse
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(store.enforce_retention().await.unwrap(), 1);
        assert!(!store.exists(&store.path_for("a.png")).await);
        assert!(store.exists(&store.path_for("b.png")).await);
        assert!(store.exists(&store.path_for("c.png")).await);
    }

    #[tokio::test]
    async fn zero_disables_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), 0).unwrap();
        for i in 0..5 {
            std::fs::write(store.path_for(&format!("{}.png", i)), b"img").unwrap();
        }
        assert_eq!(store.enforce_retention().await.unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 5);
    }
}
