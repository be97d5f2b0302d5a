use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time;

use super::*;
use crate::constants;
use crate::test_utils;
use crate::test_utils::MemoryDocumentStore;
use crate::ChangeNotification;
use crate::DocumentBacking;
use crate::DocumentError;
use crate::EntityId;
use crate::EntityView;
use crate::Error;
use crate::FeedEvent;
use crate::MachineView;
use crate::MockBacking;
use crate::ReconcileError;
use crate::ReconcileOutcome;
use crate::WatchError;
use crate::WatchSettings;

fn setup(
    reader: Arc<MemoryDocumentStore>,
) -> (
    mpsc::Sender<FeedEvent>,
    ManagerHandle,
    tokio::task::JoinHandle<crate::Result<()>>,
) {
    test_utils::enable_logger();
    let settings = WatchSettings::default();
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let backing = Arc::new(DocumentBacking::new(reader));
    let (mut manager, handle) = StoreManager::new(backing, feed_rx, &settings);
    let run = tokio::spawn(async move { manager.run().await });
    (feed_tx, handle, run)
}

fn seeded_reader() -> Arc<MemoryDocumentStore> {
    let reader = Arc::new(MemoryDocumentStore::new());
    reader.put(
        constants::MACHINES,
        "0",
        test_utils::machine_doc("0", "trusty"),
    );
    reader.put(
        constants::UNITS,
        "wordpress/0",
        test_utils::unit_doc("wordpress/0", "wordpress", None),
    );
    reader
}

async fn changed(
    feed_tx: &mpsc::Sender<FeedEvent>,
    collection: &str,
    id: &str,
) {
    feed_tx
        .send(FeedEvent::Changed(ChangeNotification::new(collection, id)))
        .await
        .expect("Should succeed to send feed event");
}

// Case 1: a watcher attached after the store is populated receives the
// full current content as its first batch, in kind-then-id order.
#[tokio::test]
async fn test_late_attach_replay() {
    let (_feed_tx, handle, _run) = setup(seeded_reader());

    let mut watcher = handle.watch();
    let deltas = watcher.next().await.expect("Should succeed to read batch");

    let ids: Vec<EntityId> = deltas.iter().map(|d| d.id.clone()).collect();
    assert_eq!(
        ids,
        vec![EntityId::machine("0"), EntityId::unit("wordpress/0")]
    );
    assert!(deltas.iter().all(|d| !d.removed));
}

// Case 2: a live document change surfaces as exactly one delta.
#[tokio::test]
async fn test_live_delta_after_initial_replay() {
    let reader = seeded_reader();
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");

    reader.put(
        constants::MACHINES,
        "1",
        test_utils::machine_doc("1", "saucy"),
    );
    changed(&feed_tx, constants::MACHINES, "1").await;

    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].id, EntityId::machine("1"));
    match deltas[0].view.as_deref() {
        Some(EntityView::Machine(m)) => assert_eq!(m.series, "saucy"),
        other => panic!("unexpected delta view: {other:?}"),
    }
}

// Case 3: idempotence. The same notification twice, with the document
// unchanged in between, produces zero deltas on the second pass.
#[tokio::test(start_paused = true)]
async fn test_duplicate_notification_emits_nothing() {
    let reader = seeded_reader();
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");

    changed(&feed_tx, constants::MACHINES, "0").await;
    changed(&feed_tx, constants::MACHINES, "0").await;

    let result = time::timeout(Duration::from_millis(100), watcher.next()).await;
    assert!(result.is_err(), "expected no delta for unchanged documents");
}

// Case 4: a document found absent on re-read emits a removal delta.
#[tokio::test]
async fn test_removed_document_emits_removal_delta() {
    let reader = seeded_reader();
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");

    reader.delete(constants::MACHINES, "0");
    changed(&feed_tx, constants::MACHINES, "0").await;

    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert!(deltas[0].removed);
    assert_eq!(deltas[0].id, EntityId::machine("0"));
    assert!(deltas[0].view.is_none());
}

// Case 5: resync completeness. After continuity loss, entities deleted
// during the gap yield removal deltas; unchanged entities yield none.
#[tokio::test]
async fn test_resync_after_continuity_loss() {
    let reader = seeded_reader();
    reader.put(
        constants::MACHINES,
        "1",
        test_utils::machine_doc("1", "saucy"),
    );
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut watcher = handle.watch();
    let initial = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(initial.len(), 3);

    // Machine 1 is destroyed while the feed is down.
    reader.delete(constants::MACHINES, "1");
    feed_tx
        .send(FeedEvent::ContinuityLost)
        .await
        .expect("Should succeed to send feed event");

    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert!(deltas[0].removed);
    assert_eq!(deltas[0].id, EntityId::machine("1"));
}

// Case 5b: an entity whose document fails to reconcile during a resync
// is left in place, not swept as stale; the failure is reported.
#[tokio::test]
async fn test_resync_protects_failing_entities() {
    let reader = seeded_reader();
    let settings = WatchSettings::default();
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let backing = Arc::new(DocumentBacking::new(reader.clone()));
    let (mut manager, handle) = StoreManager::new(backing, feed_rx, &settings);
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();
    manager.register_failure_listener(failure_tx);
    let _run = tokio::spawn(async move { manager.run().await });

    let mut watcher = handle.watch();
    let initial = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(initial.len(), 2);

    // During the gap machine 0's document becomes undecodable and the
    // unit is destroyed.
    reader.put(constants::MACHINES, "0", serde_json::json!({"life": 42}));
    reader.delete(constants::UNITS, "wordpress/0");
    feed_tx
        .send(FeedEvent::ContinuityLost)
        .await
        .expect("Should succeed to send feed event");

    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert!(deltas[0].removed);
    assert_eq!(deltas[0].id, EntityId::unit("wordpress/0"));

    let failure = failure_rx.recv().await.expect("Should receive a failure");
    assert_eq!(failure.entity_id(), Some(&EntityId::machine("0")));
}

// Case 6: the operator resync surface behaves like continuity loss.
#[tokio::test]
async fn test_force_resync() {
    let reader = seeded_reader();
    let (_feed_tx, handle, _run) = setup(reader.clone());

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");

    reader.delete(constants::UNITS, "wordpress/0");
    handle
        .force_resync()
        .await
        .expect("Should succeed to request resync");

    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert!(deltas[0].removed);
    assert_eq!(deltas[0].id, EntityId::unit("wordpress/0"));
}

// Case 7: stop semantics. Pending and future reads fail permanently;
// the run loop exits cleanly.
#[tokio::test]
async fn test_stop_fails_pending_and_future_reads() {
    let (_feed_tx, handle, run) = setup(seeded_reader());

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");

    // Park a read, then stop underneath it.
    let pending = tokio::spawn(async move { watcher.next().await });
    tokio::task::yield_now().await;
    handle.stop();

    let result = pending.await.expect("Should succeed to join");
    assert!(matches!(result, Err(WatchError::Stopped)));

    let mut late = handle.watch();
    assert!(matches!(late.next().await, Err(WatchError::Stopped)));

    assert!(run.await.expect("Should succeed to join").is_ok());
    assert_eq!(*handle.state().borrow(), ManagerState::Stopped);
}

// Case 8: stopping one watcher leaves the others progressing.
#[tokio::test]
async fn test_watcher_stop_is_isolated() {
    let reader = seeded_reader();
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut first = handle.watch();
    let mut second = handle.watch();
    first.next().await.expect("Should succeed to read batch");
    second.next().await.expect("Should succeed to read batch");

    first.stop();
    assert!(matches!(first.next().await, Err(WatchError::Stopped)));

    reader.put(
        constants::MACHINES,
        "2",
        test_utils::machine_doc("2", "quantal"),
    );
    changed(&feed_tx, constants::MACHINES, "2").await;

    let deltas = second.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].id, EntityId::machine("2"));
}

// Case 9: watchers advance independently; a late watcher replays the
// current state, a caught-up watcher sees only the increment.
#[tokio::test]
async fn test_watchers_progress_independently() {
    let reader = seeded_reader();
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut early = handle.watch();
    let initial = early.next().await.expect("Should succeed to read batch");
    assert_eq!(initial.len(), 2);

    reader.put(
        constants::MACHINES,
        "1",
        test_utils::machine_doc("1", "saucy"),
    );
    changed(&feed_tx, constants::MACHINES, "1").await;

    let increment = early.next().await.expect("Should succeed to read batch");
    assert_eq!(increment.len(), 1);

    let mut late = handle.watch();
    let replay = late.next().await.expect("Should succeed to read batch");
    let ids: Vec<EntityId> = replay.iter().map(|d| d.id.clone()).collect();
    assert_eq!(
        ids,
        vec![
            EntityId::machine("0"),
            EntityId::machine("1"),
            EntityId::unit("wordpress/0"),
        ]
    );
}

// Case 10: fan-out partial failure end to end. The resolvable owner's
// delta is delivered, the failing owner is reported, the store keeps
// the failing owner's previous view.
#[tokio::test]
async fn test_fanout_partial_failure_surfaces() {
    let reader = Arc::new(MemoryDocumentStore::new());
    reader.put(
        constants::MACHINES,
        "0",
        test_utils::machine_doc("0", "quantal"),
    );
    reader.put(
        constants::UNITS,
        "wordpress/0",
        test_utils::unit_doc("wordpress/0", "wordpress", Some("0")),
    );
    reader.put(
        constants::UNITS,
        "wordpress/1",
        test_utils::unit_doc("wordpress/1", "wordpress", Some("0")),
    );

    let settings = WatchSettings::default();
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let backing = Arc::new(DocumentBacking::new(reader.clone()));
    let (mut manager, handle) = StoreManager::new(backing, feed_rx, &settings);
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();
    manager.register_failure_listener(failure_tx);
    let _run = tokio::spawn(async move { manager.run().await });

    let mut watcher = handle.watch();
    let initial = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(initial.len(), 3);

    reader.put(
        constants::OPENED_PORTS,
        "m#0#n#juju-public",
        test_utils::ports_doc(&[
            ("wordpress/0", 80, 80, "tcp"),
            ("wordpress/1", 443, 443, "tcp"),
        ]),
    );
    reader.fail_reads_for(constants::UNITS, "wordpress/1");
    changed(&feed_tx, constants::OPENED_PORTS, "m#0#n#juju-public").await;

    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].id, EntityId::unit("wordpress/0"));

    let failure = failure_rx.recv().await.expect("Should receive a failure");
    match failure.as_ref() {
        ReconcileError::OwnerFailed { id, .. } => {
            assert_eq!(id, &EntityId::unit("wordpress/1"));
        }
        other => panic!("unexpected failure: {other:?}"),
    }
}

// Case 11: a reconciliation error is surfaced, not swallowed, and the
// loop keeps processing subsequent independent notifications.
#[tokio::test]
async fn test_reconcile_error_does_not_stall_the_loop() {
    test_utils::enable_logger();
    let mut mock = MockBacking::new();
    mock.expect_snapshot()
        .returning(|_| Ok(ReconcileOutcome::default()));
    mock.expect_reconcile().returning(|_, change| {
        if change.id == "9" {
            Err(ReconcileError::Document(DocumentError::Backend(
                "connection reset".to_string(),
            )))
        } else {
            let mut out = ReconcileOutcome::default();
            out.upsert(EntityView::Machine(MachineView {
                id: change.id.clone(),
                ..Default::default()
            }));
            Ok(out)
        }
    });

    let settings = WatchSettings::default();
    let (feed_tx, feed_rx) = mpsc::channel(16);
    let (mut manager, handle) = StoreManager::new(Arc::new(mock), feed_rx, &settings);
    let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();
    manager.register_failure_listener(failure_tx);
    let _run = tokio::spawn(async move { manager.run().await });

    changed(&feed_tx, constants::MACHINES, "9").await;
    changed(&feed_tx, constants::MACHINES, "0").await;

    let mut watcher = handle.watch();
    let deltas = watcher.next().await.expect("Should succeed to read batch");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].id, EntityId::machine("0"));

    let failure = failure_rx.recv().await.expect("Should receive a failure");
    assert!(matches!(
        failure.as_ref(),
        ReconcileError::Document(DocumentError::Backend(_))
    ));
}

// Case 12: the manager reaches Steady after the initial sync and
// reports Stopped after a fatal feed closure; pending reads fail.
#[tokio::test]
async fn test_feed_closure_is_fatal() {
    let (feed_tx, handle, run) = setup(seeded_reader());

    let mut state = handle.state();
    state
        .wait_for(|s| *s == ManagerState::Steady)
        .await
        .expect("Should reach steady state");

    let mut watcher = handle.watch();
    watcher.next().await.expect("Should succeed to read batch");
    let pending = tokio::spawn(async move { watcher.next().await });
    tokio::task::yield_now().await;

    drop(feed_tx);

    let result = run.await.expect("Should succeed to join");
    assert!(matches!(result, Err(Error::Fatal(_))));
    assert!(matches!(
        pending.await.expect("Should succeed to join"),
        Err(WatchError::Stopped)
    ));
    assert_eq!(*handle.state().borrow(), ManagerState::Stopped);
}

// Case 13: per-entity causal order. A watcher that reads between two
// changes to one entity sees both views in order; one that reads after
// both sees only the final view.
#[tokio::test]
async fn test_per_entity_order_with_collapse() {
    let reader = seeded_reader();
    let (feed_tx, handle, _run) = setup(reader.clone());

    let mut eager = handle.watch();
    eager.next().await.expect("Should succeed to read batch");
    let mut lazy = handle.watch();
    lazy.next().await.expect("Should succeed to read batch");

    reader.put(
        constants::MACHINES,
        "0",
        test_utils::machine_doc("0", "saucy"),
    );
    changed(&feed_tx, constants::MACHINES, "0").await;
    let first = eager.next().await.expect("Should succeed to read batch");
    match first[0].view.as_deref() {
        Some(EntityView::Machine(m)) => assert_eq!(m.series, "saucy"),
        other => panic!("unexpected delta view: {other:?}"),
    }

    reader.put(
        constants::MACHINES,
        "0",
        test_utils::machine_doc("0", "quantal"),
    );
    changed(&feed_tx, constants::MACHINES, "0").await;
    let second = eager.next().await.expect("Should succeed to read batch");
    match second[0].view.as_deref() {
        Some(EntityView::Machine(m)) => assert_eq!(m.series, "quantal"),
        other => panic!("unexpected delta view: {other:?}"),
    }

    // The lazy watcher sees the superseded intermediate collapsed away.
    let collapsed = lazy.next().await.expect("Should succeed to read batch");
    assert_eq!(collapsed.len(), 1);
    match collapsed[0].view.as_deref() {
        Some(EntityView::Machine(m)) => assert_eq!(m.series, "quantal"),
        other => panic!("unexpected delta view: {other:?}"),
    }
}
