//! Per-node segment archival with cursor chaining
//!
//! Each call archives one node's compressed fingerprint data for one window
//! and extends that node's forward-linked chain: the new segment is written
//! under a key derived from the window start, the previous segment (if any)
//! gets its `next`/`range` tags finalized, and the node's cursor is moved to
//! the new tail.
//!
//! Crash safety comes from key determinism: retrying the same window puts
//! the same key, re-tags the same predecessor, and rewrites the same cursor,
//! so a crash between any two steps is healed by the controller re-running
//! the window.

use chrono::Utc;
use tracing::{debug, info};

use crate::meta::{Cursor, MetaError, MetaStore};
use crate::objects::{segment_key, ObjectError, ObjectStore, SegmentTags};
use crate::store::StoreError;
use crate::Window;

/// Archival errors
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Cursor read or write failure
    #[error("cursor persistence: {0}")]
    Meta(#[from] MetaError),

    /// Object put or tag failure
    #[error("object store: {0}")]
    Object(#[from] ObjectError),

    /// Segment data could not be generated
    #[error("generating segment: {0}")]
    Segment(#[from] StoreError),

    /// Upload task aborted before producing a result
    #[error("upload task failed: {0}")]
    Task(String),
}

/// Result type for archival operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Archive one node's compressed segment for `window` and advance its chain.
///
/// Steps, in order: read the node's cursor, put the new segment at
/// `"{node_id}_{window.start}"`, tag the previous segment (when one exists)
/// with the new key and its own range, then upsert the cursor. Any failing
/// step surfaces as an error and fails the whole upload phase; nothing here
/// is rolled back because every step is idempotent under window retry.
pub async fn archive_node(
    meta: &dyn MetaStore,
    objects: &dyn ObjectStore,
    node_id: u32,
    data: Vec<u8>,
    window: Window,
) -> ArchiveResult<()> {
    let prior = meta.cursor(node_id).await?;

    let key = segment_key(node_id, window.start);
    let bytes = data.len();
    objects.put(&key, data).await?;
    debug!(node_id, key = %key, bytes, window = %window, "segment uploaded");

    if let Some(prior) = &prior {
        if prior.file_from == window.start {
            // Cursor already points at this window: a retry after a lost
            // checkpoint commit. The predecessor was tagged last time;
            // tagging again would self-link the tail.
            debug!(node_id, key = %key, "window retry detected, predecessor already linked");
        } else {
            // The previous segment's forward link could not be written until
            // its successor existed; finalize it now.
            let prior_key = segment_key(node_id, prior.file_from);
            let tags = SegmentTags {
                next: key.clone(),
                range: prior.range,
            };
            objects.set_tags(&prior_key, &tags).await?;
            debug!(node_id, prior_key = %prior_key, next = %key, "previous segment linked");
        }
    }

    let cursor = Cursor {
        node_id,
        from: window.start,
        range: window.range,
        file_from: window.start,
        timestamp: Utc::now().timestamp(),
    };
    meta.write_cursor(&cursor).await?;

    info!(
        node_id,
        key = %key,
        first_segment = prior.is_none(),
        window = %window,
        "node archive chain advanced"
    );
    Ok(())
}
