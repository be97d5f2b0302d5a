use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::WatchRequest;
use crate::Delta;
use crate::WatchError;

/// A per-subscriber cursor over the store manager's delta stream.
///
/// Each watcher advances independently; a slow consumer accumulates a
/// backlog inside the manager's entity store, never blocking the
/// manager or other watchers. The first successful [`Watcher::next`]
/// call replays the full current entity store as upsert deltas.
pub struct Watcher {
    pub(crate) id: u64,
    pub(crate) request_tx: mpsc::Sender<WatchRequest>,
    /// Child of the manager's shutdown token: cancelled by
    /// [`Watcher::stop`], a [`WatcherStopper`], or manager stop.
    pub(crate) cancel: CancellationToken,
    pub(crate) stopped: bool,
}

impl Watcher {
    /// Wait for the next batch of deltas. Returns as soon as at least
    /// one delta newer than this watcher's cursor exists, with all of
    /// them, oldest first. Fails with [`WatchError::Stopped`] once the
    /// watcher or the manager has stopped; stopping always wins the
    /// race against continued waiting.
    pub async fn next(&mut self) -> std::result::Result<Vec<Delta>, WatchError> {
        if self.stopped || self.cancel.is_cancelled() {
            return Err(WatchError::Stopped);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .request_tx
            .send(WatchRequest::Next {
                watcher_id: self.id,
                reply: reply_tx,
            })
            .await
            .is_err()
        {
            self.stopped = true;
            return Err(WatchError::Stopped);
        }

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.detach();
                Err(WatchError::Stopped)
            }
            reply = reply_rx => match reply {
                Ok(result) => result,
                Err(_) => {
                    self.stopped = true;
                    Err(WatchError::Stopped)
                }
            },
        }
    }

    /// Detach this watcher. Permanent; every subsequent `next` fails
    /// with [`WatchError::Stopped`].
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.cancel.cancel();
        self.detach();
    }

    /// A handle that can stop this watcher from another task, aborting
    /// a `next` call currently in flight.
    pub fn stopper(&self) -> WatcherStopper {
        WatcherStopper {
            cancel: self.cancel.clone(),
        }
    }

    fn detach(&mut self) {
        self.stopped = true;
        trace!(watcher_id = self.id, "watcher detached");
        let _ = self.request_tx.try_send(WatchRequest::Detach {
            watcher_id: self.id,
        });
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        if !self.stopped {
            let _ = self.request_tx.try_send(WatchRequest::Detach {
                watcher_id: self.id,
            });
        }
    }
}

/// Cancels one watcher. The cancellation races with, and always wins
/// over, a blocked `next` on the watcher it came from.
#[derive(Clone)]
pub struct WatcherStopper {
    cancel: CancellationToken,
}

impl WatcherStopper {
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
