//! File-backed keyed document store
//!
//! One JSON document per key under a base directory, written atomically
//! (temp file + persist + fsync) with an fd-lock coordinating concurrent
//! processes. Stands in for an external document database: the rest of the
//! system only sees the [`MetaStore`] seam.

use async_trait::async_trait;
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::meta::{Checkpoint, Cursor, MetaError, MetaResult, MetaStore};

const CHECKPOINT_KEY: &str = "checkpoint";

/// Keyed JSON documents on the local filesystem.
pub struct FileMetaStore {
    base_dir: PathBuf,
}

impl FileMetaStore {
    /// Open (and create if needed) a store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> MetaResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir).map_err(|e| MetaError::Io(e.to_string()))?;
        Ok(Self { base_dir })
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.base_dir.join(format!("{key}.json"))
    }

    fn cursor_key(node_id: u32) -> String {
        format!("cursor_{node_id}")
    }

    fn open_lock_file(&self, path: &Path) -> MetaResult<std::fs::File> {
        let lock_path = path.with_extension("lock");
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| MetaError::Lock(format!("creating lock file: {e}")))
    }

    fn read_document<T: serde::de::DeserializeOwned>(&self, key: &str) -> MetaResult<Option<T>> {
        let path = self.document_path(key);
        if !path.exists() {
            return Ok(None);
        }

        let lock_file = self.open_lock_file(&path)?;
        let lock = RwLock::new(lock_file);
        let _guard = lock
            .read()
            .map_err(|e| MetaError::Lock(format!("acquiring read lock: {e}")))?;

        let contents =
            std::fs::read_to_string(&path).map_err(|e| MetaError::Io(e.to_string()))?;
        let value = serde_json::from_str(&contents)
            .map_err(|e| MetaError::Deserialization(e.to_string()))?;
        Ok(Some(value))
    }

    fn write_document<T: serde::Serialize>(&self, key: &str, value: &T) -> MetaResult<()> {
        let path = self.document_path(key);
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| MetaError::Serialization(e.to_string()))?;

        let lock_file = self.open_lock_file(&path)?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| MetaError::Lock(format!("acquiring write lock: {e}")))?;

        let mut temp_file = tempfile::NamedTempFile::new_in(&self.base_dir)
            .map_err(|e| MetaError::Io(format!("creating temp file: {e}")))?;
        temp_file
            .write_all(json.as_bytes())
            .map_err(|e| MetaError::Io(format!("writing temp file: {e}")))?;
        temp_file
            .flush()
            .map_err(|e| MetaError::Io(format!("flushing temp file: {e}")))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| MetaError::Io(format!("syncing temp file: {e}")))?;
        temp_file
            .persist(&path)
            .map_err(|e| MetaError::Io(format!("persisting document: {e}")))?;

        // Fsync the directory so the rename survives a crash
        if let Ok(dir) = std::fs::File::open(&self.base_dir) {
            let _ = dir.sync_all();
        }

        debug!(key, path = %path.display(), "meta document written");
        Ok(())
    }
}

#[async_trait]
impl MetaStore for FileMetaStore {
    async fn checkpoint(&self) -> MetaResult<Option<Checkpoint>> {
        self.read_document(CHECKPOINT_KEY)
    }

    async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> MetaResult<()> {
        self.write_document(CHECKPOINT_KEY, checkpoint)
    }

    async fn cursor(&self, node_id: u32) -> MetaResult<Option<Cursor>> {
        self.read_document(&Self::cursor_key(node_id))
    }

    async fn write_cursor(&self, cursor: &Cursor) -> MetaResult<()> {
        self.write_document(&Self::cursor_key(cursor.node_id), cursor)
    }
}
