//! Observability metrics
//!
//! Counters for loop progress and failure rates, collected through the
//! `metrics` crate and optionally exposed on a Prometheus scrape endpoint.
//! Recording is a no-op until an exporter is installed, so library code can
//! call the helpers unconditionally.

use metrics::{counter, describe_counter, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Install the Prometheus exporter and register metric descriptions.
///
/// Called once at startup when a metrics address is configured.
pub fn init_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("installing Prometheus exporter: {e}"))?;

    describe_counter!(
        "windows_committed_total",
        Unit::Count,
        "Windows fully fetched, archived and checkpointed"
    );
    describe_counter!(
        "fetch_failures_total",
        Unit::Count,
        "Fetch phases aborted by a source failure"
    );
    describe_counter!(
        "upload_failures_total",
        Unit::Count,
        "Upload phases aborted by an archive failure"
    );
    describe_counter!(
        "shards_fetched_total",
        Unit::Count,
        "Fingerprint records fetched across all sources"
    );
    describe_counter!(
        "segments_uploaded_total",
        Unit::Count,
        "Archive segments written to the object store"
    );

    info!(%addr, "metrics exporter listening");
    Ok(())
}

/// Count a committed window.
pub fn record_window_committed() {
    counter!("windows_committed_total").increment(1);
}

/// Count an aborted fetch phase.
pub fn record_fetch_failure() {
    counter!("fetch_failures_total").increment(1);
}

/// Count an aborted upload phase.
pub fn record_upload_failure() {
    counter!("upload_failures_total").increment(1);
}

/// Count fingerprint records fetched in a successful fetch phase.
pub fn record_shards_fetched(count: usize) {
    counter!("shards_fetched_total").increment(count as u64);
}

/// Count segments written in a successful upload phase.
pub fn record_segments_uploaded(count: usize) {
    counter!("segments_uploaded_total").increment(count as u64);
}
