use tokio::sync::oneshot;

use crate::Delta;
use crate::WatchError;

pub(crate) type NextReply = oneshot::Sender<std::result::Result<Vec<Delta>, WatchError>>;

/// Requests watchers and operators send to the store manager task.
pub(crate) enum WatchRequest {
    /// Deliver every delta newer than this watcher's cursor; parks
    /// until one exists or the manager stops.
    Next { watcher_id: u64, reply: NextReply },

    /// Forget this watcher's cursor. Its pinned backlog becomes
    /// purgeable.
    Detach { watcher_id: u64 },

    /// Force a full resynchronization pass (operator/test surface).
    Resync,
}
