//! Object store seam
//!
//! The archive side of the system only needs two operations from its blob
//! store: put an object at a key (overwrite allowed, which is what makes
//! whole-window retries idempotent) and set forward-link tags on a
//! previously written key.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod fs;
pub mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

/// Object store errors
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Tagging a key that was never written
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Result type for object store operations
pub type ObjectResult<T> = Result<T, ObjectError>;

/// Forward-link tags set on a segment once its successor exists.
///
/// `next` is the successor segment's object key; `range` is the window
/// length the tagged segment itself covers. A segment's outgoing link is
/// only finalized one cycle after the segment is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentTags {
    /// Object key of the next segment in the chain
    pub next: String,
    /// Window length covered by the tagged segment, seconds
    pub range: i64,
}

/// Seam to the blob store holding archive segments.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write an object, overwriting any existing object at `key`.
    async fn put(&self, key: &str, data: Vec<u8>) -> ObjectResult<()>;

    /// Set the forward-link tags on a previously written object.
    async fn set_tags(&self, key: &str, tags: &SegmentTags) -> ObjectResult<()>;
}

/// Deterministic object key for one node's segment of one window.
pub fn segment_key(node_id: u32, file_from: i64) -> String {
    format!("{node_id}_{file_from}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_key_format() {
        assert_eq!(segment_key(1, 0), "1_0");
        assert_eq!(segment_key(42, 1200), "42_1200");
    }
}
