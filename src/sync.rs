//! Port synchronizer.
//!
//! Owns the "last synced port" and decides whether a candidate port needs to
//! be pushed to qBittorrent. Candidates arrive from the file watcher and from
//! the manual `/sync` endpoint; a single async mutex serializes them so that
//! only one remote mutation is ever in flight.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::error::SyncResult;

/// Maximum remote update attempts per candidate port.
pub const MAX_ATTEMPTS: u32 = 5;

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// The remote endpoint whose listen port is kept in sync.
///
/// Seam for tests; implemented by [`crate::qbit::QbitClient`].
#[async_trait]
pub trait PortTarget: Send + Sync {
    async fn set_listen_port(&self, port: u16) -> SyncResult<()>;
}

/// Deduplicating, retrying port synchronizer.
pub struct PortSync {
    target: Arc<dyn PortTarget>,
    current: Mutex<Option<u16>>,
    initial_backoff: Duration,
}

impl PortSync {
    pub fn new(target: Arc<dyn PortTarget>) -> Self {
        Self::with_backoff(target, DEFAULT_INITIAL_BACKOFF)
    }

    /// Construct with a custom initial backoff. Tests shrink it; production
    /// uses the one-second default, doubling per retry (1, 2, 4, 8).
    pub fn with_backoff(target: Arc<dyn PortTarget>, initial_backoff: Duration) -> Self {
        Self {
            target,
            current: Mutex::new(None),
            initial_backoff,
        }
    }

    /// Handle a validated candidate port.
    ///
    /// The lock is held for the entire call, backoff sleeps included. That
    /// serializes concurrent candidates into a total order and guarantees a
    /// single writer against the remote configuration; a manual `/sync` can
    /// therefore block behind an in-flight retry sequence.
    pub async fn on_candidate_port(&self, port: u16) {
        let mut current = self.current.lock().await;

        if *current == Some(port) {
            tracing::info!(port, "port already synced, skipping");
            return;
        }

        tracing::info!(port, "syncing new port to qBittorrent");

        let mut backoff = self.initial_backoff;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.target.set_listen_port(port).await {
                Ok(()) => {
                    tracing::info!(port, "successfully set listen port");
                    *current = Some(port);
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        port,
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %err,
                        "failed to set listen port"
                    );
                    if attempt < MAX_ATTEMPTS {
                        tracing::info!(backoff = ?backoff, "retrying after backoff");
                        tokio::time::sleep(backoff).await;
                        backoff *= 2;
                    }
                }
            }
        }

        // No partial-attempt memory: a later identical candidate starts
        // again from attempt 1.
        tracing::error!(port, "exhausted all retries, port not synced");
    }

    pub async fn current_port(&self) -> Option<u16> {
        *self.current.lock().await
    }
}
