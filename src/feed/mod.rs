//! The raw change feed boundary.
//!
//! The feed delivers (collection, document id) pairs with at-least-once
//! semantics and no payload; the receiver must re-read the authoritative
//! document. Same-document events arrive in document-mutation order, but
//! no global order is guaranteed, and the feed may signal that it lost
//! continuity (e.g. after a reconnect), which forces a full resync.

use tokio::sync::mpsc;

use crate::FeedConfig;

/// A raw "collection C, document I changed" notification. Not retained
/// after processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub collection: String,
    pub id: String,
}

impl ChangeNotification {
    pub fn new(
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// A document changed; re-read to find out how.
    Changed(ChangeNotification),
    /// The feed lost continuity; notifications may have been missed and
    /// the derived view must be rebuilt by a full resync.
    ContinuityLost,
}

/// Build the channel a feed producer uses to drive a store manager.
pub fn feed_channel(config: &FeedConfig) -> (mpsc::Sender<FeedEvent>, mpsc::Receiver<FeedEvent>) {
    mpsc::channel(config.channel_capacity)
}
