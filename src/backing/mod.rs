//! Backing Adapter
//!
//! Translates raw (collection, document id) change notifications into
//! entity view mutations by re-reading authoritative documents and
//! recomputing derived fields. Dispatch is a collection→handler
//! registry built at construction; adding a collection means adding a
//! handler, not editing a central conditional.

mod annotations;
mod applications;
mod constraints;
mod docs;
mod machines;
mod opened_ports;
mod relations;
mod settings;
mod statuses;
mod units;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::trace;

use crate::constants;
use crate::ChangeNotification;
use crate::DocumentError;
use crate::EntityId;
use crate::EntityStore;
use crate::EntityView;
use crate::ReconcileError;

pub(crate) use docs::*;

/// A raw persisted document: a free-form field mapping.
pub type Document = serde_json::Value;

/// Read boundary of the authoritative document store. A missing
/// document is `Ok(None)`, never an error.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Document>, DocumentError>;

    /// Every (id, document) pair of a collection.
    async fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Document)>, DocumentError>;
}

/// One entity store mutation produced by reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityMutation {
    Upsert(EntityView),
    Remove(EntityId),
}

/// The ordered mutations of one reconciliation pass, plus the isolated
/// failures of a multi-owner fan-out.
#[derive(Default)]
pub struct ReconcileOutcome {
    pub mutations: Vec<EntityMutation>,
    pub failures: Vec<ReconcileError>,
}

impl ReconcileOutcome {
    pub fn upsert(
        &mut self,
        view: EntityView,
    ) {
        self.mutations.push(EntityMutation::Upsert(view));
    }

    pub fn remove(
        &mut self,
        id: EntityId,
    ) {
        self.mutations.push(EntityMutation::Remove(id));
    }
}

/// The reconciliation contract consumed by the store manager.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Backing: Send + Sync + 'static {
    /// Reconcile one raw change notification against the current
    /// derived view. Unknown collections are a no-op.
    async fn reconcile(
        &self,
        store: &EntityStore,
        change: &ChangeNotification,
    ) -> Result<ReconcileOutcome, ReconcileError>;

    /// Enumerate every primary document and reconcile each as present.
    /// Used for the full resynchronization pass; per-document failures
    /// are isolated into the outcome, a failed enumeration is fatal.
    async fn snapshot(
        &self,
        store: &EntityStore,
    ) -> Result<ReconcileOutcome, ReconcileError>;
}

/// Read context handed to collection handlers: the document reader plus
/// the current derived view (handlers only ever read the store; the
/// manager applies their mutations).
pub(crate) struct ReconcileContext<'a, S: DocumentStore> {
    pub reader: &'a S,
    pub store: &'a EntityStore,
}

#[async_trait]
pub(crate) trait CollectionHandler<S: DocumentStore>: Send + Sync {
    fn collection(&self) -> &'static str;

    /// Primary collections map 1:1 to an entity kind and are
    /// enumerated during resync; fan-in collections only matter for
    /// incremental notifications.
    fn primary(&self) -> bool {
        false
    }

    /// The entity a primary document id addresses. Scopes enumeration
    /// failures so a resync sweep leaves the affected entity alone.
    fn primary_entity(
        &self,
        _id: &str,
    ) -> Option<EntityId> {
        None
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError>;

    async fn removed(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError>;
}

/// Production [`Backing`] over a [`DocumentStore`].
pub struct DocumentBacking<S: DocumentStore> {
    reader: Arc<S>,
    handlers: HashMap<&'static str, Box<dyn CollectionHandler<S>>>,
    snapshot_order: Vec<&'static str>,
}

impl<S: DocumentStore> DocumentBacking<S> {
    pub fn new(reader: Arc<S>) -> Self {
        let all: Vec<Box<dyn CollectionHandler<S>>> = vec![
            Box::new(machines::MachinesHandler),
            Box::new(applications::ApplicationsHandler),
            Box::new(units::UnitsHandler),
            Box::new(relations::RelationsHandler),
            Box::new(annotations::AnnotationsHandler),
            Box::new(statuses::StatusesHandler),
            Box::new(constraints::ConstraintsHandler),
            Box::new(settings::SettingsHandler),
            Box::new(opened_ports::OpenedPortsHandler),
        ];
        let mut handlers = HashMap::new();
        let mut snapshot_order = Vec::new();
        for handler in all {
            if handler.primary() {
                snapshot_order.push(handler.collection());
            }
            handlers.insert(handler.collection(), handler);
        }
        Self {
            reader,
            handlers,
            snapshot_order,
        }
    }
}

#[async_trait]
impl<S: DocumentStore> Backing for DocumentBacking<S> {
    async fn reconcile(
        &self,
        store: &EntityStore,
        change: &ChangeNotification,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut out = ReconcileOutcome::default();
        let Some(handler) = self.handlers.get(change.collection.as_str()) else {
            trace!(
                collection = %change.collection,
                "ignoring change for unwatched collection"
            );
            return Ok(out);
        };
        let ctx = ReconcileContext {
            reader: self.reader.as_ref(),
            store,
        };
        match self.reader.get(&change.collection, &change.id).await? {
            Some(doc) => handler.updated(&ctx, &change.id, doc, &mut out).await?,
            None => handler.removed(&ctx, &change.id, &mut out).await?,
        }
        Ok(out)
    }

    async fn snapshot(
        &self,
        store: &EntityStore,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut out = ReconcileOutcome::default();
        let ctx = ReconcileContext {
            reader: self.reader.as_ref(),
            store,
        };
        for collection in &self.snapshot_order {
            let handler = &self.handlers[collection];
            let mut docs = self.reader.list(collection).await?;
            docs.sort_by(|a, b| a.0.cmp(&b.0));
            for (id, doc) in docs {
                if let Err(e) = handler.updated(&ctx, &id, doc, &mut out).await {
                    out.failures.push(match handler.primary_entity(&id) {
                        Some(entity) => ReconcileError::OwnerFailed {
                            id: entity,
                            source: Box::new(e),
                        },
                        None => e,
                    });
                }
            }
        }
        Ok(out)
    }
}

// ============== Global key helpers ============== //

pub(crate) fn machine_global_key(id: &str) -> String {
    format!("{}{id}", constants::MACHINE_PREFIX)
}

pub(crate) fn unit_global_key(name: &str) -> String {
    format!("{}{name}", constants::UNIT_PREFIX)
}

pub(crate) fn application_global_key(name: &str) -> String {
    format!("{}{name}", constants::APPLICATION_PREFIX)
}

pub(crate) fn settings_global_key(
    name: &str,
    charm_url: &str,
) -> String {
    format!(
        "{}{name}{}{charm_url}",
        constants::APPLICATION_PREFIX,
        constants::KEY_SEPARATOR
    )
}

pub(crate) fn ports_global_key(
    machine_id: &str,
    network: &str,
) -> String {
    format!(
        "{}{machine_id}{}{}{network}",
        constants::MACHINE_PREFIX,
        constants::KEY_SEPARATOR,
        constants::NETWORK_SEGMENT
    )
}

/// Resolve a status/annotation-style global key to the entity it is
/// scoped to. Unknown prefixes return `None` (ignored, not an error).
pub(crate) fn parse_owner_key(key: &str) -> Option<EntityId> {
    if let Some(id) = key.strip_prefix(constants::MACHINE_PREFIX) {
        Some(EntityId::machine(id))
    } else if let Some(name) = key.strip_prefix(constants::UNIT_PREFIX) {
        Some(EntityId::unit(name))
    } else if let Some(name) = key.strip_prefix(constants::APPLICATION_PREFIX) {
        Some(EntityId::application(name))
    } else {
        None
    }
}

/// Split an application settings key `a#<name>#<charm-url>` into its
/// owner and version token. Keys without a version token are not
/// application settings.
pub(crate) fn parse_settings_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix(constants::APPLICATION_PREFIX)?;
    rest.split_once(constants::KEY_SEPARATOR)
}

/// Extract the machine id from an opened-ports key `m#<id>#n#<network>`.
pub(crate) fn parse_ports_key(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(constants::MACHINE_PREFIX)?;
    let (machine_id, network) = rest.split_once(constants::KEY_SEPARATOR)?;
    network.strip_prefix(constants::NETWORK_SEGMENT)?;
    Some(machine_id)
}
