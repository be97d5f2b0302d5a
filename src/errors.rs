//! Change-Propagation Error Hierarchy
//!
//! Defines error types for the watcher subsystem, categorized by
//! processing layer: document reads, reconciliation, and watcher
//! delivery.

use config::ConfigError;

use crate::EntityId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failures while reconciling a single raw change notification
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Watcher delivery failures
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures requiring subsystem termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

/// A failure while turning one raw change notification into entity
/// mutations. Fatal for that notification only; the processing loop
/// continues with the next one.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Document store read failure other than "not found"
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A document was read but could not be decoded
    #[error("malformed {collection} document {id}: {source}")]
    Malformed {
        collection: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    /// A reconciled view failed structural validation
    #[error("invalid {id} entity: {reason}")]
    InvalidEntity { id: EntityId, reason: String },

    /// One entity of a multi-entity pass (fan-out or resync
    /// enumeration) failed; sibling entities were still reconciled
    /// independently.
    #[error("reconciling {id} failed: {source}")]
    OwnerFailed {
        id: EntityId,
        #[source]
        source: Box<ReconcileError>,
    },
}

impl ReconcileError {
    /// The entity this failure is scoped to, when one can be named.
    /// Resync sweeps skip these identities rather than removing them
    /// on incomplete information.
    pub fn entity_id(&self) -> Option<&EntityId> {
        match self {
            ReconcileError::InvalidEntity { id, .. } => Some(id),
            ReconcileError::OwnerFailed { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Errors at the document store boundary. "Not found" is not an error:
/// reads return `Ok(None)` and trigger removal logic instead.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// Backend read failure (I/O, connection loss)
    #[error("document backend error: {0}")]
    Backend(String),

    /// The store cannot serve reads at all right now
    #[error("document store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The store manager or this watcher has been stopped. Permanent;
    /// every pending and future `next` call fails with this.
    #[error("watcher was stopped")]
    Stopped,
}

// ============== Conversion Implementations ============== //
impl From<DocumentError> for Error {
    fn from(e: DocumentError) -> Self {
        Error::Reconcile(ReconcileError::Document(e))
    }
}
