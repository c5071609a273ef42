//! In-memory document store used by tests
//!
//! Behaves like the file-backed store without touching disk, and can inject
//! persistence failures to exercise the controller's retry paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::meta::{Checkpoint, Cursor, MetaError, MetaResult, MetaStore};

/// Keyed documents held in process memory.
#[derive(Default)]
pub struct MemoryMetaStore {
    checkpoint: Mutex<Option<Checkpoint>>,
    cursors: Mutex<HashMap<u32, Cursor>>,
    fail_checkpoint_reads: AtomicBool,
    fail_checkpoint_writes: AtomicBool,
    fail_cursor_writes: AtomicBool,
}

impl MemoryMetaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent checkpoint reads fail, simulating an unreachable
    /// document store.
    pub fn fail_checkpoint_reads(&self, fail: bool) {
        self.fail_checkpoint_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent checkpoint writes fail, simulating a crash between
    /// upload and commit.
    pub fn fail_checkpoint_writes(&self, fail: bool) {
        self.fail_checkpoint_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent cursor writes fail.
    pub fn fail_cursor_writes(&self, fail: bool) {
        self.fail_cursor_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of cursor records present.
    pub fn cursor_count(&self) -> usize {
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl MetaStore for MemoryMetaStore {
    async fn checkpoint(&self) -> MetaResult<Option<Checkpoint>> {
        if self.fail_checkpoint_reads.load(Ordering::SeqCst) {
            return Err(MetaError::Io("injected checkpoint read failure".into()));
        }
        Ok(*self
            .checkpoint
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> MetaResult<()> {
        if self.fail_checkpoint_writes.load(Ordering::SeqCst) {
            return Err(MetaError::Io("injected checkpoint write failure".into()));
        }
        *self
            .checkpoint
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(*checkpoint);
        Ok(())
    }

    async fn cursor(&self, node_id: u32) -> MetaResult<Option<Cursor>> {
        Ok(self
            .cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&node_id)
            .cloned())
    }

    async fn write_cursor(&self, cursor: &Cursor) -> MetaResult<()> {
        if self.fail_cursor_writes.load(Ordering::SeqCst) {
            return Err(MetaError::Io("injected cursor write failure".into()));
        }
        self.cursors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(cursor.node_id, cursor.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Window;

    #[tokio::test]
    async fn test_checkpoint_and_cursor_roundtrip() {
        let store = MemoryMetaStore::new();
        assert_eq!(store.checkpoint().await.unwrap(), None);

        let cp = Checkpoint::for_window(Window::new(0, 600));
        store.write_checkpoint(&cp).await.unwrap();
        assert_eq!(store.checkpoint().await.unwrap(), Some(cp));

        let cursor = Cursor {
            node_id: 1,
            from: 0,
            range: 600,
            file_from: 0,
            timestamp: 0,
        };
        store.write_cursor(&cursor).await.unwrap();
        assert_eq!(store.cursor(1).await.unwrap(), Some(cursor));
        assert_eq!(store.cursor_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_write_failures() {
        let store = MemoryMetaStore::new();
        store.fail_checkpoint_writes(true);
        assert!(store
            .write_checkpoint(&Checkpoint::for_window(Window::new(0, 600)))
            .await
            .is_err());

        store.fail_checkpoint_writes(false);
        assert!(store
            .write_checkpoint(&Checkpoint::for_window(Window::new(0, 600)))
            .await
            .is_ok());
    }
}
