//! Store Manager
//!
//! The single-task coordinator: consumes the raw change feed, drives
//! the backing adapter, mutates the entity store, and fans resulting
//! deltas out to attached watchers. Processing is fully serialized,
//! one notification at a time, which eliminates locking inside
//! reconciliation and makes per-entity causal ordering trivial.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ManagerHandle;
use super::NextReply;
use super::WatchRequest;
use crate::metrics::ACTIVE_WATCHERS;
use crate::metrics::DELTAS_EMITTED;
use crate::metrics::NOTIFICATIONS_PROCESSED;
use crate::metrics::RECONCILE_FAILURES;
use crate::metrics::RESYNC_TOTAL;
use crate::Backing;
use crate::ChangeNotification;
use crate::EntityId;
use crate::EntityMutation;
use crate::EntityStore;
use crate::Error;
use crate::FeedEvent;
use crate::ReconcileError;
use crate::Result;
use crate::WatchError;
use crate::WatchSettings;

/// Lifecycle of a store manager. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ManagerState {
    Starting,
    /// Full resynchronization in progress.
    Syncing,
    /// Processing incremental notifications.
    Steady,
    Stopped,
}

#[derive(Default)]
struct WatcherCursor {
    /// Highest store revision this watcher has been handed.
    revno: u64,
    /// Parked `next` call, answered on the next observable change.
    pending: Option<NextReply>,
}

pub struct StoreManager<B>
where
    B: Backing,
{
    backing: Arc<B>,
    store: EntityStore,

    feed_rx: mpsc::Receiver<FeedEvent>,

    // Kept so the request channel never closes while the manager runs.
    #[allow(dead_code)]
    request_tx: mpsc::Sender<WatchRequest>,
    request_rx: mpsc::Receiver<WatchRequest>,

    watchers: HashMap<u64, WatcherCursor>,

    state_tx: watch::Sender<ManagerState>,

    // For reconciliation failures to reach operators without stopping
    // the processing loop.
    failure_listeners: Vec<mpsc::UnboundedSender<Arc<ReconcileError>>>,

    // Shutdown signal
    shutdown: CancellationToken,
}

impl<B> StoreManager<B>
where
    B: Backing,
{
    pub fn new(
        backing: Arc<B>,
        feed_rx: mpsc::Receiver<FeedEvent>,
        settings: &WatchSettings,
    ) -> (Self, ManagerHandle) {
        let (request_tx, request_rx) = mpsc::channel(settings.manager.request_capacity);
        let (state_tx, state_rx) = watch::channel(ManagerState::Starting);
        let shutdown = CancellationToken::new();

        let handle = ManagerHandle {
            request_tx: request_tx.clone(),
            shutdown: shutdown.clone(),
            state_rx,
            watcher_seq: Arc::new(AtomicU64::new(0)),
        };
        let manager = StoreManager {
            backing,
            store: EntityStore::new(),
            feed_rx,
            request_tx,
            request_rx,
            watchers: HashMap::new(),
            state_tx,
            failure_listeners: Vec::new(),
            shutdown,
        };
        (manager, handle)
    }

    /// Register a channel that receives every reconciliation failure.
    /// Must be called before [`StoreManager::run`].
    pub fn register_failure_listener(
        &mut self,
        tx: mpsc::UnboundedSender<Arc<ReconcileError>>,
    ) {
        self.failure_listeners.push(tx);
    }

    /// Drive the manager until stopped. Builds the derived view from
    /// scratch with a full resync, then processes live notifications
    /// one at a time.
    pub async fn run(&mut self) -> Result<()> {
        self.run_resync().await?;

        loop {
            tokio::select! {
                // Use biased to ensure branch order
                biased;
                // P0: shutdown received;
                _ = self.shutdown.cancelled() => {
                    warn!("store manager shutdown signal received.");
                    self.enter_stopped();
                    return Ok(());
                }

                // P1: raw change feed
                maybe_event = self.feed_rx.recv() => {
                    match maybe_event {
                        Some(FeedEvent::Changed(change)) => {
                            trace!(collection = %change.collection, id = %change.id, "receive change notification");
                            self.handle_change(change).await;
                        }
                        Some(FeedEvent::ContinuityLost) => {
                            info!("change feed lost continuity; resynchronizing");
                            self.run_resync().await?;
                        }
                        None => {
                            error!("change feed closed unexpectedly");
                            self.enter_stopped();
                            return Err(Error::Fatal("change feed closed".to_string()));
                        }
                    }
                    self.respond();
                }

                // P2: watcher and operator requests
                Some(request) = self.request_rx.recv() => {
                    match request {
                        WatchRequest::Resync => {
                            info!("resync requested");
                            self.run_resync().await?;
                        }
                        other => self.handle_request(other),
                    }
                    self.respond();
                }
            }
        }
    }

    /// Full resynchronization: `Syncing` until the enumeration
    /// completes. Entities no longer present are removed so their
    /// destruction during a feed gap still surfaces as removal deltas.
    async fn run_resync(&mut self) -> Result<()> {
        self.transition(ManagerState::Syncing);
        RESYNC_TOTAL.inc();
        match self.resync().await {
            Ok(()) => {
                self.transition(ManagerState::Steady);
                Ok(())
            }
            Err(e) => {
                error!("resync failed: {e}");
                self.enter_stopped();
                Err(e.into())
            }
        }
    }

    async fn resync(&mut self) -> std::result::Result<(), ReconcileError> {
        let outcome = self.backing.snapshot(&self.store).await?;

        let mut seen: HashSet<EntityId> = HashSet::new();
        for mutation in &outcome.mutations {
            match mutation {
                EntityMutation::Upsert(view) => seen.insert(view.entity_id()),
                EntityMutation::Remove(id) => seen.insert(id.clone()),
            };
        }
        // Entities whose reconciliation failed are left alone rather
        // than swept on incomplete information.
        let mut protected: HashSet<EntityId> = HashSet::new();
        for failure in outcome.failures {
            if let Some(id) = failure.entity_id() {
                protected.insert(id.clone());
            }
            self.report_failure(failure);
        }

        self.apply(outcome.mutations);

        let stale: Vec<EntityId> = self
            .store
            .live_identities()
            .into_iter()
            .filter(|id| !seen.contains(id) && !protected.contains(id))
            .collect();
        for id in stale {
            debug!(entity = %id, "entity gone after resync; removing");
            if self.store.remove(&id) {
                DELTAS_EMITTED.with_label_values(&[id.kind.as_str()]).inc();
            }
        }
        Ok(())
    }

    async fn handle_change(
        &mut self,
        change: ChangeNotification,
    ) {
        NOTIFICATIONS_PROCESSED
            .with_label_values(&[change.collection.as_str()])
            .inc();
        match self.backing.reconcile(&self.store, &change).await {
            Ok(outcome) => {
                for failure in outcome.failures {
                    self.report_failure(failure);
                }
                self.apply(outcome.mutations);
            }
            Err(e) => {
                error!(
                    collection = %change.collection,
                    id = %change.id,
                    "reconciliation failed: {e}"
                );
                self.report_failure(e);
            }
        }
    }

    fn apply(
        &mut self,
        mutations: Vec<EntityMutation>,
    ) {
        for mutation in mutations {
            match mutation {
                EntityMutation::Upsert(view) => {
                    let kind = view.kind();
                    if self.store.update(view) {
                        DELTAS_EMITTED.with_label_values(&[kind.as_str()]).inc();
                    }
                }
                EntityMutation::Remove(id) => {
                    if self.store.remove(&id) {
                        DELTAS_EMITTED.with_label_values(&[id.kind.as_str()]).inc();
                    }
                }
            }
        }
    }

    fn handle_request(
        &mut self,
        request: WatchRequest,
    ) {
        match request {
            WatchRequest::Next { watcher_id, reply } => {
                let cursor = self.watchers.entry(watcher_id).or_insert_with(|| {
                    ACTIVE_WATCHERS.inc();
                    WatcherCursor::default()
                });
                // A replaced reply sender drops, failing the stale call.
                cursor.pending = Some(reply);
            }
            WatchRequest::Detach { watcher_id } => {
                if self.watchers.remove(&watcher_id).is_some() {
                    ACTIVE_WATCHERS.dec();
                    debug!(watcher_id, "watcher detached");
                }
            }
            WatchRequest::Resync => unreachable!("handled by the run loop"),
        }
    }

    /// Answer every parked watcher that has observable changes, then
    /// garbage-collect removals every cursor has passed.
    fn respond(&mut self) {
        let latest = self.store.latest_revno();
        let mut horizon = latest;
        for cursor in self.watchers.values_mut() {
            // A caller that gave up waiting must not have its cursor
            // advanced past deltas it never received.
            if cursor.pending.as_ref().is_some_and(|reply| reply.is_closed()) {
                cursor.pending = None;
            }
            if cursor.pending.is_some() && cursor.revno < latest {
                let initial = cursor.revno == 0;
                let mut deltas = self.store.changes_since(cursor.revno);
                if deltas.is_empty() {
                    // Every change in the window is unobservable for
                    // this cursor; skipping it loses nothing.
                    cursor.revno = latest;
                } else {
                    if initial {
                        // The attach replay is delivered in kind-then-id
                        // order; batches carry at most one delta per
                        // entity, so sorting cannot reorder an entity's
                        // history.
                        deltas.sort_by(|a, b| a.id.cmp(&b.id));
                    }
                    if let Some(reply) = cursor.pending.take() {
                        if reply.send(Ok(deltas)).is_ok() {
                            cursor.revno = latest;
                        }
                    }
                }
            }
            horizon = horizon.min(cursor.revno);
        }
        self.store.purge_removed_through(horizon);
    }

    fn report_failure(
        &self,
        failure: ReconcileError,
    ) {
        RECONCILE_FAILURES.inc();
        let failure = Arc::new(failure);
        for tx in &self.failure_listeners {
            if let Err(e) = tx.send(failure.clone()) {
                error!("report_failure failed: {:?}", e);
            }
        }
    }

    /// Terminal transition: fail every parked and future watcher read.
    fn enter_stopped(&mut self) {
        self.shutdown.cancel();
        for (_, cursor) in self.watchers.drain() {
            if let Some(reply) = cursor.pending {
                let _ = reply.send(Err(WatchError::Stopped));
            }
        }
        ACTIVE_WATCHERS.set(0);
        self.transition(ManagerState::Stopped);
    }

    fn transition(
        &self,
        state: ManagerState,
    ) {
        debug!(?state, "manager state transition");
        self.state_tx.send_replace(state);
    }
}
