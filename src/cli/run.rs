//! `run` command: wire up stores, sources and the controller, then loop
//! until interrupted.

use anyhow::Context;
use clap::Args;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::fetcher::{HttpShardSource, ShardSource};
use crate::meta::FileMetaStore;
use crate::metrics;
use crate::objects::FsObjectStore;
use crate::service::{Reconciler, ReconcilerConfig};
use crate::shutdown::ShutdownCoordinator;

/// Arguments for the `run` command. Flags and environment variables
/// override values from the config file.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to a TOML config file
    #[arg(long, env = "ARCHIVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sync source base URL (repeatable), overrides the config file list
    #[arg(long = "sync-url")]
    pub sync_urls: Vec<String>,

    /// First window start when no checkpoint exists, Unix seconds
    #[arg(long)]
    pub start_time: Option<i64>,

    /// Window length in seconds
    #[arg(long)]
    pub time_range: Option<i64>,

    /// Seconds to wait after a deferred or failed cycle
    #[arg(long)]
    pub wait_time: Option<u64>,

    /// Lag guard margin in seconds
    #[arg(long)]
    pub skip_time: Option<i64>,

    /// Directory backing checkpoint and cursor documents
    #[arg(long)]
    pub meta_dir: Option<PathBuf>,

    /// Directory backing archive segment objects
    #[arg(long)]
    pub object_dir: Option<PathBuf>,

    /// Prometheus scrape address, e.g. 0.0.0.0:9090
    #[arg(long)]
    pub metrics_addr: Option<std::net::SocketAddr>,
}

impl RunArgs {
    fn effective_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref()).context("loading configuration")?;
        if !self.sync_urls.is_empty() {
            config.sync_urls = self.sync_urls.clone();
        }
        if let Some(start_time) = self.start_time {
            config.start_time = start_time;
        }
        if let Some(time_range) = self.time_range {
            config.time_range = time_range;
        }
        if let Some(wait_time) = self.wait_time {
            config.wait_time = wait_time;
        }
        if let Some(skip_time) = self.skip_time {
            config.skip_time = skip_time;
        }
        if let Some(meta_dir) = &self.meta_dir {
            config.meta_dir = meta_dir.clone();
        }
        if let Some(object_dir) = &self.object_dir {
            config.object_dir = object_dir.clone();
        }
        if let Some(metrics_addr) = self.metrics_addr {
            config.metrics_addr = Some(metrics_addr);
        }
        config.validate()?;
        Ok(config)
    }

    /// Execute the synchronization loop until shutdown.
    pub async fn execute(&self, shutdown: Arc<ShutdownCoordinator>) -> anyhow::Result<()> {
        let config = self.effective_config()?;

        if let Some(addr) = config.metrics_addr {
            metrics::init_metrics(addr)?;
        }

        let meta = Arc::new(FileMetaStore::open(&config.meta_dir).context("opening meta store")?);
        let objects =
            Arc::new(FsObjectStore::open(&config.object_dir).context("opening object store")?);

        let client = Arc::new(Client::new());
        let sources: Vec<Arc<dyn ShardSource>> = config
            .sync_urls
            .iter()
            .map(|url| {
                Arc::new(HttpShardSource::new(Arc::clone(&client), url.clone()))
                    as Arc<dyn ShardSource>
            })
            .collect();

        info!(
            sources = sources.len(),
            meta_dir = %config.meta_dir.display(),
            object_dir = %config.object_dir.display(),
            "service configured"
        );

        let reconciler = Reconciler::new(
            ReconcilerConfig {
                start_time: config.start_time,
                time_range: config.time_range,
                wait_time: Duration::from_secs(config.wait_time),
                skip_time: config.skip_time,
            },
            sources,
            meta,
            objects,
        );
        reconciler.run(shutdown).await;
        Ok(())
    }
}
