use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::ManagerState;
use super::WatchRequest;
use super::Watcher;
use crate::WatchError;

/// Control surface of a running store manager: attach watchers, force
/// a resync, observe state transitions, stop.
#[derive(Clone)]
pub struct ManagerHandle {
    pub(crate) request_tx: mpsc::Sender<WatchRequest>,
    pub(crate) shutdown: CancellationToken,
    pub(crate) state_rx: watch::Receiver<ManagerState>,
    pub(crate) watcher_seq: Arc<AtomicU64>,
}

impl ManagerHandle {
    /// Attach a new watcher. Its first `next` replays the full current
    /// entity store before any live delta.
    pub fn watch(&self) -> Watcher {
        let id = self.watcher_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Watcher {
            id,
            request_tx: self.request_tx.clone(),
            cancel: self.shutdown.child_token(),
            stopped: false,
        }
    }

    /// Force a `Steady → Syncing` transition, re-enumerating every
    /// primary document. Exposed for operators and tests.
    pub async fn force_resync(&self) -> std::result::Result<(), WatchError> {
        self.request_tx
            .send(WatchRequest::Resync)
            .await
            .map_err(|_| WatchError::Stopped)
    }

    /// Stop the manager. Terminal: all blocked watcher reads fail
    /// immediately and permanently, no further notifications are
    /// processed.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Observe manager state transitions.
    pub fn state(&self) -> watch::Receiver<ManagerState> {
        self.state_rx.clone()
    }
}
