//! Stripe-locked in-memory fingerprint aggregation
//!
//! A [`ShardStore`] instance is scoped to a single window cycle: the
//! controller creates it fresh, hands it by reference to every fetch task,
//! and drops or clears it at the cycle boundary. No data survives a failed
//! cycle; a retry re-fetches from scratch.

use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

/// Number of lock stripes. Writers for different nodes land on different
/// stripes with high probability, bounding contention to O(1/stripe).
pub const STRIPE_COUNT: usize = 1000;

/// Gzip level used for segment data, matching the archive format consumed
/// by external auditors.
const SEGMENT_COMPRESSION_LEVEL: u32 = 7;

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Compression failure while generating segment data
    #[error("compressing segment data: {0}")]
    Compress(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Concurrent-safe mapping from node id to the ordered sequence of
/// fingerprint byte strings observed for it in the current window.
///
/// Each stripe owns its own sub-map, so `add` only locks the stripe the
/// node id hashes to.
pub struct ShardStore {
    stripes: Vec<Mutex<HashMap<u32, Vec<Bytes>>>>,
}

impl ShardStore {
    /// Create an empty store with the default stripe count.
    pub fn new() -> Self {
        Self::with_stripes(STRIPE_COUNT)
    }

    /// Create an empty store with an explicit stripe count.
    pub fn with_stripes(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(HashMap::new())).collect();
        Self { stripes }
    }

    fn stripe(&self, node_id: u32) -> &Mutex<HashMap<u32, Vec<Bytes>>> {
        &self.stripes[node_id as usize % self.stripes.len()]
    }

    /// Append a fingerprint for `node_id` under its stripe lock.
    pub fn add(&self, node_id: u32, fingerprint: Bytes) {
        let mut stripe = self
            .stripe(node_id)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stripe.entry(node_id).or_default().push(fingerprint);
    }

    /// Node ids with at least one fingerprint this window, ascending.
    ///
    /// Sorted so the upload fan-out visits nodes in a deterministic order.
    pub fn node_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .stripes
            .iter()
            .flat_map(|stripe| {
                stripe
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .keys()
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Gzip-compress the concatenation of the node's accumulated
    /// fingerprints, in insertion order.
    ///
    /// Called only after the fetch-phase barrier, when no writer remains
    /// active; the stripe lock is still taken for safety.
    pub fn generate(&self, node_id: u32) -> StoreResult<Vec<u8>> {
        let stripe = self
            .stripe(node_id)
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(SEGMENT_COMPRESSION_LEVEL));
        if let Some(fingerprints) = stripe.get(&node_id) {
            for fingerprint in fingerprints {
                encoder.write_all(fingerprint)?;
            }
        }
        Ok(encoder.finish()?)
    }

    /// Reset to empty. Called at every cycle boundary regardless of outcome.
    pub fn clear(&self) {
        for stripe in &self.stripes {
            stripe
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clear();
        }
    }
}

impl Default for ShardStore {
    fn default() -> Self {
        Self::new()
    }
}
