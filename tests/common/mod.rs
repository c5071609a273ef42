//! Shared test fixtures: scripted sync sources and an in-memory harness
//! around the reconciler.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::collections::HashMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use shard_archiver::fetcher::{FetchError, FetchResult, ShardRecord, ShardSource};
use shard_archiver::meta::MemoryMetaStore;
use shard_archiver::objects::MemoryObjectStore;
use shard_archiver::service::{Reconciler, ReconcilerConfig};

/// A sync source whose responses are scripted per window start.
pub struct ScriptedSource {
    name: String,
    responses: Mutex<HashMap<i64, Vec<ShardRecord>>>,
    fail: AtomicBool,
}

impl ScriptedSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(HashMap::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Script the records returned for the window starting at `from`.
    /// Unscripted windows return an empty list, like a quiet source.
    pub fn respond(&self, from: i64, records: Vec<ShardRecord>) {
        self.responses.lock().unwrap().insert(from, records);
    }

    /// Make subsequent fetches fail with a transport error.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ShardSource for ScriptedSource {
    async fn fetch_window(&self, from: i64, _to: i64) -> FetchResult<Vec<ShardRecord>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(FetchError::Transport(format!("{} unreachable", self.name)));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&from)
            .cloned()
            .unwrap_or_default())
    }

    fn endpoint(&self) -> &str {
        &self.name
    }
}

/// Reconciler over in-memory stores and scripted sources.
pub struct Harness {
    pub meta: Arc<MemoryMetaStore>,
    pub objects: Arc<MemoryObjectStore>,
    pub sources: Vec<Arc<ScriptedSource>>,
    pub reconciler: Reconciler,
}

/// Build a harness with `source_count` scripted sources and the given
/// window parameters. `wait_time` is immaterial since tests drive
/// `run_cycle` directly.
pub fn harness(source_count: usize, start_time: i64, time_range: i64, skip_time: i64) -> Harness {
    let meta = Arc::new(MemoryMetaStore::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let sources: Vec<Arc<ScriptedSource>> = (0..source_count)
        .map(|i| Arc::new(ScriptedSource::new(format!("sn{i}"))))
        .collect();

    let reconciler = Reconciler::new(
        ReconcilerConfig {
            start_time,
            time_range,
            wait_time: Duration::from_millis(1),
            skip_time,
        },
        sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn ShardSource>)
            .collect(),
        Arc::clone(&meta) as Arc<dyn shard_archiver::meta::MetaStore>,
        Arc::clone(&objects) as Arc<dyn shard_archiver::objects::ObjectStore>,
    );

    Harness {
        meta,
        objects,
        sources,
        reconciler,
    }
}

/// Build one fingerprint record.
pub fn record(record_id: i64, node_id: u32, fingerprint: &str, block_id: i64) -> ShardRecord {
    ShardRecord {
        record_id,
        node_id,
        fingerprint: Bytes::from(fingerprint.as_bytes().to_vec()),
        block_id,
    }
}

/// Decompress a gzip segment back to its fingerprint concatenation.
pub fn gunzip(data: &[u8]) -> Vec<u8> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}
