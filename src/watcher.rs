//! Port file watcher.
//!
//! A VPN sidecar (gluetun) periodically rewrites a small file containing the
//! externally forwarded port. This module watches the file's parent directory
//! for create/modify events and pushes validated port numbers onto a channel.
//! Watching the directory rather than the file tolerates the file not
//! existing yet and survives atomic replace-and-rename rewrites.

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{SyncError, SyncResult};

/// Handle for the background file watcher.
///
/// Dropping it stops the watch; the process keeps it alive for its lifetime.
pub struct PortWatcher {
    _watcher: RecommendedWatcher,
}

impl PortWatcher {
    /// Start watching `path` for port updates.
    ///
    /// Events are filtered to create/modify notifications whose target is
    /// exactly `path`; on each match the file is re-read and, if it holds a
    /// valid port, the value is sent down `tx`. Validation runs on the
    /// watcher's own thread. Fails if the parent directory cannot be
    /// monitored; the caller treats that as non-fatal (manual checks still
    /// work).
    pub fn spawn(path: &Path, tx: UnboundedSender<u16>) -> SyncResult<Self> {
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .ok_or_else(|| {
                SyncError::WatchEstablishment(format!(
                    "{} has no parent directory",
                    path.display()
                ))
            })?
            .to_path_buf();
        let target = path.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                        return;
                    }
                    if !event.paths.iter().any(|p| p == &target) {
                        return;
                    }
                    tracing::debug!(kind = ?event.kind, "port file event");
                    if let Some(port) = check_file_now(&target) {
                        if tx.send(port).is_err() {
                            tracing::debug!("port channel closed, dropping update");
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "watch error");
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        Ok(Self { _watcher: watcher })
    }
}

/// Read and validate the port file once.
///
/// Used on startup (the file may predate the process), from watch events and
/// from the manual `/sync` endpoint. Stateless: every failure is logged and
/// dropped, the next write or manual check retries naturally.
pub fn check_file_now(path: &Path) -> Option<u16> {
    if !path.exists() {
        return None;
    }

    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read port file");
            return None;
        }
    };

    match parse_port(&raw) {
        Ok(port) => port,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "dropping port file contents");
            None
        }
    }
}

/// Parse port file contents.
///
/// Whitespace-only content is not an error, just nothing to do yet. Anything
/// that is not a base-10 integer in [1, 65535] is rejected.
pub fn parse_port(raw: &str) -> SyncResult<Option<u16>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: i64 = trimmed
        .parse()
        .map_err(|_| SyncError::PortParse(trimmed.to_string()))?;

    if !(1..=65535).contains(&value) {
        return Err(SyncError::PortParse(value.to_string()));
    }

    Ok(Some(value as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_ports() {
        assert_eq!(parse_port("12345").unwrap(), Some(12345));
        assert_eq!(parse_port(" 12345 \n").unwrap(), Some(12345));
        assert_eq!(parse_port("1").unwrap(), Some(1));
        assert_eq!(parse_port("65535").unwrap(), Some(65535));
    }

    #[test]
    fn test_parse_empty_is_silent() {
        assert_eq!(parse_port("").unwrap(), None);
        assert_eq!(parse_port("  \n\t").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(parse_port("0").is_err());
        assert!(parse_port("65536").is_err());
        assert!(parse_port("-5").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_port("abc").is_err());
        assert!(parse_port("12 34").is_err());
        assert!(parse_port("123.4").is_err());
    }

    #[test]
    fn test_check_file_now_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(check_file_now(&dir.path().join("forwarded_port")), None);
    }

    #[test]
    fn test_check_file_now_reads_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forwarded_port");
        std::fs::write(&path, "23456\n").unwrap();
        assert_eq!(check_file_now(&path), Some(23456));

        std::fs::write(&path, "not-a-port").unwrap();
        assert_eq!(check_file_now(&path), None);
    }
}
