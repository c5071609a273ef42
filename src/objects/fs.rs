//! Filesystem-backed object store
//!
//! Objects are plain files under a root directory; tags live in a JSON
//! sidecar next to the object. Both are written atomically so a crashed
//! upload never leaves a torn segment for the auditor to trip over.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::objects::{ObjectError, ObjectResult, ObjectStore, SegmentTags};

/// Archive segments as files under a root directory.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> ObjectResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| ObjectError::Io(e.to_string()))?;
        Ok(Self { root })
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn tags_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.tags"))
    }

    fn write_atomic(&self, path: &Path, data: &[u8]) -> ObjectResult<()> {
        let mut temp_file = tempfile::NamedTempFile::new_in(&self.root)
            .map_err(|e| ObjectError::Io(format!("creating temp file: {e}")))?;
        temp_file
            .write_all(data)
            .map_err(|e| ObjectError::Io(format!("writing temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| ObjectError::Io(format!("flushing temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ObjectError::Io(format!("syncing temp file: {e}")))?;
        temp_file
            .persist(path)
            .map_err(|e| ObjectError::Io(format!("persisting object: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> ObjectResult<()> {
        self.write_atomic(&self.object_path(key), &data)?;
        debug!(key, bytes = data.len(), "object written");
        Ok(())
    }

    async fn set_tags(&self, key: &str, tags: &SegmentTags) -> ObjectResult<()> {
        if !self.object_path(key).exists() {
            return Err(ObjectError::NotFound(key.to_string()));
        }
        let json = serde_json::to_vec_pretty(tags)
            .map_err(|e| ObjectError::Serialization(e.to_string()))?;
        self.write_atomic(&self.tags_path(key), &json)?;
        debug!(key, next = %tags.next, range = tags.range, "object tagged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();

        store.put("1_0", b"first".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("1_0")).unwrap(), b"first");

        // Retried puts of the same window overwrite harmlessly
        store.put("1_0", b"second".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("1_0")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_set_tags_writes_sidecar() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();

        store.put("1_0", b"data".to_vec()).await.unwrap();
        let tags = SegmentTags {
            next: "1_600".to_string(),
            range: 600,
        };
        store.set_tags("1_0", &tags).await.unwrap();

        let sidecar = std::fs::read_to_string(dir.path().join("1_0.tags")).unwrap();
        let loaded: SegmentTags = serde_json::from_str(&sidecar).unwrap();
        assert_eq!(loaded, tags);
    }

    #[tokio::test]
    async fn test_set_tags_on_missing_object_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsObjectStore::open(dir.path()).unwrap();

        let tags = SegmentTags {
            next: "9_600".to_string(),
            range: 600,
        };
        match store.set_tags("9_0", &tags).await {
            Err(ObjectError::NotFound(key)) => assert_eq!(key, "9_0"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
