//! Checkpoint/window controller and scheduling loop
//!
//! Owns the global synchronization loop. Each cycle is an explicit
//! three-stage state machine over a single in-flight window:
//!
//! ```text
//! FETCHING ──all sources ok──▶ UPLOADING ──all nodes ok──▶ COMMITTING
//!     │                            │
//!     └─── any failure: clear store, wait, retry the same window ───┘
//! ```
//!
//! Both phases are hard barriers: every spawned task runs to completion and
//! reports its result before the controller moves on. A single failing task
//! discards the entire window's accumulated state; partial archives for some
//! nodes but not others would corrupt the chain invariant.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::archive::{self, ArchiveError};
use crate::fetcher::{FetchError, ShardSource};
use crate::meta::{Checkpoint, MetaStore};
use crate::metrics;
use crate::objects::ObjectStore;
use crate::shutdown::ShutdownCoordinator;
use crate::store::ShardStore;
use crate::Window;

/// Loop timing and window parameters.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// First window start when no checkpoint exists, Unix seconds
    pub start_time: i64,
    /// Window length, seconds
    pub time_range: i64,
    /// Sleep between iterations after a deferred or failed cycle
    pub wait_time: Duration,
    /// Lag guard: a window may only be processed once it ends more than
    /// this many seconds in the past
    pub skip_time: i64,
}

/// Phase of the cycle state machine in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Concurrent per-source fetch into the aggregation store
    Fetching,
    /// Concurrent per-node segment upload
    Uploading,
}

/// Result of one pass through the loop.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The candidate window is not yet safely in the past
    Deferred(Window),
    /// A phase failed; the same window will be retried
    Failed {
        /// Phase that failed
        phase: Phase,
        /// Window that will be retried unchanged
        window: Window,
    },
    /// Both phases succeeded and the checkpoint was committed
    Committed(Window),
}

/// The synchronization loop controller.
pub struct Reconciler {
    config: ReconcilerConfig,
    sources: Vec<Arc<dyn ShardSource>>,
    meta: Arc<dyn MetaStore>,
    objects: Arc<dyn ObjectStore>,
}

impl Reconciler {
    /// Create a controller over the given sources and stores.
    pub fn new(
        config: ReconcilerConfig,
        sources: Vec<Arc<dyn ShardSource>>,
        meta: Arc<dyn MetaStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            config,
            sources,
            meta,
            objects,
        }
    }

    /// Run the loop until shutdown is requested.
    ///
    /// No error is fatal: deferred and failed cycles sleep `wait_time` and
    /// retry; committed cycles continue immediately with the next window.
    pub async fn run(&self, shutdown: Arc<ShutdownCoordinator>) {
        info!(
            sources = self.sources.len(),
            time_range = self.config.time_range,
            "reconciler starting"
        );
        while !shutdown.is_shutdown_requested() {
            let now = Utc::now().timestamp();
            match self.run_cycle(now).await {
                CycleOutcome::Committed(window) => {
                    info!(window = %window, "window committed");
                }
                CycleOutcome::Deferred(window) => {
                    debug!(window = %window, "window not yet in the safe past, waiting");
                    self.wait(&shutdown).await;
                }
                CycleOutcome::Failed { phase, window } => {
                    warn!(?phase, window = %window, "cycle failed, retrying same window");
                    self.wait(&shutdown).await;
                }
            }
        }
        info!("reconciler stopped");
    }

    async fn wait(&self, shutdown: &ShutdownCoordinator) {
        tokio::select! {
            _ = tokio::time::sleep(self.config.wait_time) => {}
            _ = shutdown.wait_for_shutdown() => {}
        }
    }

    /// Execute one pass: window selection, fetch barrier, upload barrier,
    /// checkpoint commit. `now` is injected so the lag guard is testable.
    pub async fn run_cycle(&self, now: i64) -> CycleOutcome {
        // Window selection. A checkpoint-read failure that is not
        // "not found" is treated like a fetch failure: wait and retry.
        let prior_checkpoint = match self.meta.checkpoint().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                error!(error = %e, "reading checkpoint");
                return CycleOutcome::Failed {
                    phase: Phase::Fetching,
                    window: Window::new(self.config.start_time, self.config.time_range),
                };
            }
        };
        let window = match &prior_checkpoint {
            Some(checkpoint) => {
                let window = Window::new(
                    checkpoint.start + checkpoint.range,
                    self.config.time_range,
                );
                debug!(prior = %checkpoint.window(), candidate = %window, "checkpoint found");
                window
            }
            None => {
                let window = Window::new(self.config.start_time, self.config.time_range);
                debug!(candidate = %window, "no checkpoint record, starting from configured time");
                window
            }
        };

        if window_is_premature(window, now, self.config.skip_time) {
            return CycleOutcome::Deferred(window);
        }

        // FETCHING: one task per source, all writing into a store scoped to
        // this cycle. The store is dropped with the cycle, so failed windows
        // leave nothing behind.
        let store = Arc::new(ShardStore::new());
        info!(window = %window, sources = self.sources.len(), "fetching shards");
        if let Err(e) = self.fetch_phase(&store, window).await {
            error!(error = %e, window = %window, "fetch phase failed");
            metrics::record_fetch_failure();
            store.clear();
            return CycleOutcome::Failed {
                phase: Phase::Fetching,
                window,
            };
        }

        // UPLOADING: one task per node with data.
        let node_ids = store.node_ids();
        info!(window = %window, nodes = node_ids.len(), "uploading segments");
        if let Err(e) = self.upload_phase(&store, &node_ids, window).await {
            error!(error = %e, window = %window, "upload phase failed");
            metrics::record_upload_failure();
            store.clear();
            return CycleOutcome::Failed {
                phase: Phase::Uploading,
                window,
            };
        }

        // COMMITTING: the store is cleared first; cursor writes for this
        // window all completed inside the upload barrier.
        store.clear();
        let checkpoint = Checkpoint::for_window(window);
        if let Err(e) = self.meta.write_checkpoint(&checkpoint).await {
            // Non-fatal: segment keys are deterministic and archive_node is
            // idempotent under window retry, so re-processing this window
            // after the stale checkpoint is re-read is safe.
            error!(error = %e, window = %window, "checkpoint commit failed, window may be re-processed");
        }
        metrics::record_window_committed();
        CycleOutcome::Committed(window)
    }

    /// Barrier over one fetch task per source. Every task runs to
    /// completion; results are examined in task-index order and the first
    /// error aborts the phase.
    async fn fetch_phase(&self, store: &Arc<ShardStore>, window: Window) -> Result<(), FetchError> {
        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let store = Arc::clone(store);
                tokio::spawn(async move {
                    let records = source.fetch_window(window.start, window.end()).await?;
                    let count = records.len();
                    for record in records {
                        store.add(record.node_id, record.fingerprint);
                    }
                    debug!(source = source.endpoint(), records = count, "source fetched");
                    Ok::<usize, FetchError>(count)
                })
            })
            .collect();

        let mut first_error = None;
        let mut total = 0usize;
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let result = joined
                .unwrap_or_else(|e| Err(FetchError::Task(e.to_string())));
            match result {
                Ok(count) => total += count,
                Err(e) => {
                    error!(
                        source = self.sources[index].endpoint(),
                        error = %e,
                        "fetching shards from source"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                metrics::record_shards_fetched(total);
                Ok(())
            }
        }
    }

    /// Barrier over one upload task per node with data. Same collection
    /// rule as the fetch phase; node ids are sorted, so "first error" is
    /// deterministic.
    async fn upload_phase(
        &self,
        store: &Arc<ShardStore>,
        node_ids: &[u32],
        window: Window,
    ) -> Result<(), ArchiveError> {
        let handles: Vec<_> = node_ids
            .iter()
            .map(|&node_id| {
                let store = Arc::clone(store);
                let meta = Arc::clone(&self.meta);
                let objects = Arc::clone(&self.objects);
                tokio::spawn(async move {
                    let data = store.generate(node_id)?;
                    archive::archive_node(meta.as_ref(), objects.as_ref(), node_id, data, window)
                        .await
                })
            })
            .collect();

        let mut first_error = None;
        let mut uploaded = 0usize;
        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            let result = joined
                .unwrap_or_else(|e| Err(ArchiveError::Task(e.to_string())));
            match result {
                Ok(()) => uploaded += 1,
                Err(e) => {
                    error!(node_id = node_ids[index], error = %e, "archiving node segment");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => {
                metrics::record_segments_uploaded(uploaded);
                Ok(())
            }
        }
    }
}

/// Lag guard: true when the window is not yet safely in the past, meaning
/// sources may still be ingesting data for it.
pub fn window_is_premature(window: Window, now: i64, skip_time: i64) -> bool {
    window.end() > now - skip_time
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_guard_window_inside_skip_margin_waits() {
        // now=1000, skip=300: safe horizon is 700, a window ending at 750
        // is still too fresh
        assert!(window_is_premature(Window::new(150, 600), 1000, 300));
    }

    #[test]
    fn test_lag_guard_window_past_skip_margin_proceeds() {
        // now=1000, skip=100: safe horizon is 900, a window ending at 750
        // proceeds
        assert!(!window_is_premature(Window::new(150, 600), 1000, 100));
    }

    #[test]
    fn test_lag_guard_window_ending_near_now_waits() {
        // now=1000, skip=100: a window ending at 950 waits
        assert!(window_is_premature(Window::new(350, 600), 1000, 100));
    }

    #[test]
    fn test_lag_guard_boundary_is_exclusive() {
        // end == now - skip is exactly on the horizon and proceeds
        assert!(!window_is_premature(Window::new(100, 600), 1000, 300));
    }
}
