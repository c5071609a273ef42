//! Resumability across process restarts with the file-backed stores.

mod common;

use common::{gunzip, record, ScriptedSource};
use shard_archiver::fetcher::ShardSource;
use shard_archiver::meta::{FileMetaStore, MetaStore};
use shard_archiver::objects::FsObjectStore;
use shard_archiver::service::{CycleOutcome, Reconciler, ReconcilerConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const NOW: i64 = 1_000_000;

fn reconciler(
    source: Arc<ScriptedSource>,
    meta_dir: &std::path::Path,
    object_dir: &std::path::Path,
) -> Reconciler {
    Reconciler::new(
        ReconcilerConfig {
            start_time: 0,
            time_range: 600,
            wait_time: Duration::from_millis(1),
            skip_time: 300,
        },
        vec![source as Arc<dyn ShardSource>],
        Arc::new(FileMetaStore::open(meta_dir).unwrap()),
        Arc::new(FsObjectStore::open(object_dir).unwrap()),
    )
}

#[tokio::test]
async fn test_restart_resumes_from_persisted_checkpoint() {
    let meta_dir = TempDir::new().unwrap();
    let object_dir = TempDir::new().unwrap();

    let source = Arc::new(ScriptedSource::new("sn0"));
    source.respond(0, vec![record(1, 1, "w0", 1)]);
    source.respond(600, vec![record(2, 1, "w1", 2)]);

    // First process lifetime: one window
    {
        let r = reconciler(Arc::clone(&source), meta_dir.path(), object_dir.path());
        assert!(matches!(r.run_cycle(NOW).await, CycleOutcome::Committed(_)));
    }

    // Second lifetime reopens the same directories and picks up at 600
    let r = reconciler(Arc::clone(&source), meta_dir.path(), object_dir.path());
    match r.run_cycle(NOW).await {
        CycleOutcome::Committed(window) => assert_eq!(window.start, 600),
        other => panic!("expected committed window, got {other:?}"),
    }

    // Both segments and the finalized link are on disk
    assert_eq!(
        gunzip(&std::fs::read(object_dir.path().join("1_0")).unwrap()),
        b"w0"
    );
    assert_eq!(
        gunzip(&std::fs::read(object_dir.path().join("1_600")).unwrap()),
        b"w1"
    );
    let tags = std::fs::read_to_string(object_dir.path().join("1_0.tags")).unwrap();
    assert!(tags.contains("1_600"));

    let meta = FileMetaStore::open(meta_dir.path()).unwrap();
    assert_eq!(meta.checkpoint().await.unwrap().unwrap().start, 600);
    assert_eq!(meta.cursor(1).await.unwrap().unwrap().file_from, 600);
}
