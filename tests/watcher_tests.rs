//! File watcher integration tests against a real filesystem.

use qsync::watcher::{check_file_now, PortWatcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

async fn expect_port(rx: &mut UnboundedReceiver<u16>, want: u16) {
    // A single write can surface as several create/modify events; accept
    // repeats of earlier values until the expected port shows up.
    let wait = async {
        loop {
            match rx.recv().await {
                Some(port) if port == want => break,
                Some(_) => continue,
                None => panic!("watcher channel closed"),
            }
        }
    };
    timeout(EVENT_TIMEOUT, wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for port {}", want));
}

async fn settle(rx: &mut UnboundedReceiver<u16>) {
    tokio::time::sleep(Duration::from_millis(300)).await;
    while rx.try_recv().is_ok() {}
}

#[tokio::test]
async fn test_watcher_end_to_end_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarded_port");

    // The watched file does not exist yet.
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = PortWatcher::spawn(&path, tx).unwrap();

    std::fs::write(&path, "11111").unwrap();
    expect_port(&mut rx, 11111).await;

    std::fs::write(&path, "22222").unwrap();
    expect_port(&mut rx, 22222).await;

    // Invalid contents must never reach the channel.
    settle(&mut rx).await;
    std::fs::write(&path, "invalid").unwrap();
    assert!(
        timeout(Duration::from_secs(1), rx.recv()).await.is_err(),
        "invalid contents produced a port event"
    );
}

#[tokio::test]
async fn test_watcher_survives_atomic_replace() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarded_port");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = PortWatcher::spawn(&path, tx).unwrap();

    // gluetun-style atomic rewrite: temp file in the same directory, then
    // rename over the target.
    let tmp = dir.path().join(".forwarded_port.tmp");
    std::fs::write(&tmp, "33333").unwrap();
    std::fs::rename(&tmp, &path).unwrap();

    expect_port(&mut rx, 33333).await;
}

#[tokio::test]
async fn test_watcher_ignores_sibling_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarded_port");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = PortWatcher::spawn(&path, tx).unwrap();

    std::fs::write(dir.path().join("other_file"), "44444").unwrap();
    assert!(
        timeout(Duration::from_secs(1), rx.recv()).await.is_err(),
        "sibling file produced a port event"
    );
}

#[tokio::test]
async fn test_watcher_requires_existing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("forwarded_port");

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(PortWatcher::spawn(&path, tx).is_err());
}

#[test]
fn test_check_file_now_matches_watch_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarded_port");

    assert_eq!(check_file_now(Path::new(&path)), None);

    std::fs::write(&path, " 12345 \n").unwrap();
    assert_eq!(check_file_now(&path), Some(12345));

    std::fs::write(&path, "65536").unwrap();
    assert_eq!(check_file_now(&path), None);
}
