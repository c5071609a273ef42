//! # Shard Archiver Library
//!
//! A checkpointed reconciliation service that collects shard fingerprints
//! from a fleet of storage-node report services ("sync sources") and archives
//! each node's fingerprint history as compressed, forward-chained segments in
//! an object store.
//!
//! ## How it works
//!
//! The service runs an unbounded loop over half-open time windows
//! `[start, start+range)`. Each cycle:
//!
//! 1. Reads the global [`meta::Checkpoint`] to determine the next window.
//! 2. Defers the window if it is not yet safely in the past (lag guard).
//! 3. Fetches fingerprints from every sync source concurrently into a
//!    stripe-locked [`store::ShardStore`]. Any source failing aborts the
//!    whole window.
//! 4. Uploads one compressed segment per node with data, chaining each new
//!    segment to its predecessor via object tags and a per-node
//!    [`meta::Cursor`].
//! 5. Commits the checkpoint only after both phases succeed.
//!
//! A failed cycle discards all in-memory state and retries the identical
//! window after a fixed wait, so the loop is safe to resume after a crash or
//! partial failure at any point. Segment keys are deterministic per window,
//! which makes upload retries idempotent.
//!
//! ## Architecture
//!
//! - [`service`] - Checkpoint/window controller and scheduling loop
//! - [`fetcher`] - Per-source bounded-window fingerprint fetch
//! - [`store`] - Stripe-locked in-memory aggregation per node
//! - [`archive`] - Per-node segment upload and cursor chaining
//! - [`meta`] - Checkpoint and cursor persistence
//! - [`objects`] - Object store seam (put + tag)
//! - [`cli`] - Command-line interface

#![warn(missing_docs)]
#![warn(clippy::all)]

use serde::{Deserialize, Serialize};

/// Per-node segment archival with cursor chaining
pub mod archive;
/// CLI command implementations
pub mod cli;
/// Runtime configuration loading
pub mod config;
/// Sync source fetchers
pub mod fetcher;
/// Checkpoint and cursor persistence
pub mod meta;
/// Observability metrics
pub mod metrics;
/// Object store seam
pub mod objects;
/// Synchronization loop controller
pub mod service;
/// Graceful shutdown coordination
pub mod shutdown;
/// In-memory fingerprint aggregation
pub mod store;

/// A half-open time interval `[start, start+range)` over which fingerprint
/// records are queried from sync sources. All values are Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    /// Start of the window (inclusive), Unix seconds
    pub start: i64,
    /// Length of the window in seconds
    pub range: i64,
}

impl Window {
    /// Create a new window.
    pub fn new(start: i64, range: i64) -> Self {
        Self { start, range }
    }

    /// End of the window (exclusive), Unix seconds.
    pub fn end(&self) -> i64 {
        self.start + self.range
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
