//! In-memory object store used by tests
//!
//! Holds objects and tags in maps, exposes them for assertions, and can
//! inject put/tag failures to exercise all-or-nothing upload semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::objects::{ObjectError, ObjectResult, ObjectStore, SegmentTags};

/// Objects and tags held in process memory.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    tags: Mutex<HashMap<String, SegmentTags>>,
    fail_puts: AtomicBool,
    fail_tags: AtomicBool,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent puts fail.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent tag writes fail.
    pub fn fail_tags(&self, fail: bool) {
        self.fail_tags.store(fail, Ordering::SeqCst);
    }

    /// Stored object bytes for `key`, if any.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Stored tags for `key`, if any.
    pub fn tags(&self, key: &str) -> Option<SegmentTags> {
        self.tags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Number of objects stored.
    pub fn object_count(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, data: Vec<u8>) -> ObjectResult<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectError::Io("injected put failure".into()));
        }
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn set_tags(&self, key: &str, tags: &SegmentTags) -> ObjectResult<()> {
        if self.fail_tags.load(Ordering::SeqCst) {
            return Err(ObjectError::Io("injected tag failure".into()));
        }
        if !self
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(key)
        {
            return Err(ObjectError::NotFound(key.to_string()));
        }
        self.tags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.to_string(), tags.clone());
        Ok(())
    }
}
