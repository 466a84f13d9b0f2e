//! Synchronizer behavior through the public API, including the full
//! watcher-to-synchronizer pipeline against a real filesystem.

use async_trait::async_trait;
use qsync::watcher::PortWatcher;
use qsync::{PortSync, PortTarget, SyncResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;

/// Always-succeeding target that records every applied port.
struct RecordingTarget {
    applied: Mutex<Vec<u16>>,
}

impl RecordingTarget {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            applied: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PortTarget for RecordingTarget {
    async fn set_listen_port(&self, port: u16) -> SyncResult<()> {
        self.applied.lock().await.push(port);
        Ok(())
    }
}

async fn wait_for_synced(sync: &PortSync, want: u16) {
    let wait = async {
        loop {
            if sync.current_port().await == Some(want) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    timeout(Duration::from_secs(5), wait)
        .await
        .unwrap_or_else(|_| panic!("port {} never synced", want));
}

#[tokio::test]
async fn test_idempotent_candidates_apply_once() {
    let target = RecordingTarget::new();
    let sync = PortSync::new(target.clone());

    sync.on_candidate_port(12345).await;
    sync.on_candidate_port(12345).await;
    sync.on_candidate_port(12345).await;

    assert_eq!(*target.applied.lock().await, vec![12345]);
}

#[tokio::test]
async fn test_file_to_remote_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarded_port");

    let target = RecordingTarget::new();
    let sync = Arc::new(PortSync::new(target.clone()));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = PortWatcher::spawn(&path, tx).unwrap();

    let consumer = sync.clone();
    tokio::spawn(async move {
        while let Some(port) = rx.recv().await {
            consumer.on_candidate_port(port).await;
        }
    });

    std::fs::write(&path, "11111").unwrap();
    wait_for_synced(&sync, 11111).await;

    // Rewriting the same value fires events but must not re-apply.
    std::fs::write(&path, "11111").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(*target.applied.lock().await, vec![11111]);

    std::fs::write(&path, "22222").unwrap();
    wait_for_synced(&sync, 22222).await;

    // Invalid contents leave the synced port untouched.
    std::fs::write(&path, "invalid").unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(sync.current_port().await, Some(22222));
    assert_eq!(*target.applied.lock().await, vec![11111, 22222]);
}
