use std::sync::Arc;

use tokio::sync::mpsc;

use super::*;
use crate::constants;
use crate::test_utils;
use crate::test_utils::MemoryDocumentStore;
use crate::DocumentBacking;
use crate::EntityId;
use crate::FeedEvent;
use crate::WatchError;
use crate::WatchSettings;

fn setup() -> (
    Arc<MemoryDocumentStore>,
    mpsc::Sender<FeedEvent>,
    ManagerHandle,
) {
    test_utils::enable_logger();
    let reader = Arc::new(MemoryDocumentStore::new());
    reader.put(
        constants::MACHINES,
        "0",
        test_utils::machine_doc("0", "quantal"),
    );
    let settings = WatchSettings::default();
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let backing = Arc::new(DocumentBacking::new(reader.clone()));
    let (mut manager, handle) = StoreManager::new(backing, feed_rx, &settings);
    tokio::spawn(async move { manager.run().await });
    (reader, feed_tx, handle)
}

// Case 1: a stopper cancels a next call blocked in another task; the
// cancellation wins over continued waiting.
#[tokio::test]
async fn test_stopper_aborts_blocked_next() {
    let (_reader, _feed_tx, handle) = setup();

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");
    let stopper = watcher.stopper();

    let blocked = tokio::spawn(async move { watcher.next().await });
    tokio::task::yield_now().await;
    stopper.stop();

    let result = blocked.await.expect("Should succeed to join");
    assert!(matches!(result, Err(WatchError::Stopped)));
}

// Case 2: next never returns stale data after stop, even when deltas
// arrived in between.
#[tokio::test]
async fn test_no_stale_data_after_stop() {
    let (reader, feed_tx, handle) = setup();

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");
    watcher.stop();

    reader.put(
        constants::MACHINES,
        "1",
        test_utils::machine_doc("1", "quantal"),
    );
    feed_tx
        .send(FeedEvent::Changed(crate::ChangeNotification::new(
            constants::MACHINES,
            "1",
        )))
        .await
        .expect("Should succeed to send feed event");

    assert!(matches!(watcher.next().await, Err(WatchError::Stopped)));
}

// Case 3: a watcher's first next on an empty store blocks until the
// first entity appears.
#[tokio::test]
async fn test_first_next_waits_for_content() {
    test_utils::enable_logger();
    let reader = Arc::new(MemoryDocumentStore::new());
    let settings = WatchSettings::default();
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let backing = Arc::new(DocumentBacking::new(reader.clone()));
    let (mut manager, handle) = StoreManager::new(backing, feed_rx, &settings);
    tokio::spawn(async move { manager.run().await });

    let mut watcher = handle.watch();
    let pending = tokio::spawn(async move { watcher.next().await });
    tokio::task::yield_now().await;

    reader.put(
        constants::MACHINES,
        "0",
        test_utils::machine_doc("0", "quantal"),
    );
    feed_tx
        .send(FeedEvent::Changed(crate::ChangeNotification::new(
            constants::MACHINES,
            "0",
        )))
        .await
        .expect("Should succeed to send feed event");

    let deltas = pending
        .await
        .expect("Should succeed to join")
        .expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].id, EntityId::machine("0"));
}
