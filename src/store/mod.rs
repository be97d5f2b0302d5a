//! EntityStore
//!
//! The in-memory derived view: at most one entry per entity identity,
//! each carrying the latest denormalized snapshot under a monotonically
//! increasing revision. Watcher cursors read the store through
//! [`EntityStore::changes_since`]; superseded intermediate views are
//! collapsed into the latest one, so any batch carries at most one
//! delta per entity and per-entity causal order reduces to revision
//! monotonicity.
//!
//! The store has exactly one writer (the store manager task), so no
//! interior locking is needed.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use crate::Delta;
use crate::EntityId;
use crate::EntityView;

struct EntityEntry {
    /// Revision at which the current lifecycle segment started.
    creation_revno: u64,
    /// Revision of the latest change to this entry.
    revno: u64,
    removed: bool,
    view: Arc<EntityView>,
}

#[derive(Default)]
pub struct EntityStore {
    latest_revno: u64,
    entities: HashMap<EntityId, EntityEntry>,
    /// Revision index; every live revision maps to exactly one entity.
    order: BTreeMap<u64, EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_revno(&self) -> u64 {
        self.latest_revno
    }

    /// The latest view of a live entity.
    pub fn get(
        &self,
        id: &EntityId,
    ) -> Option<Arc<EntityView>> {
        self.entities
            .get(id)
            .filter(|e| !e.removed)
            .map(|e| e.view.clone())
    }

    /// Store a recomputed view. Change detection is by full structural
    /// equality: storing a view identical to the current one is a no-op
    /// and burns no revision. Returns true when the store changed (and
    /// a delta became observable).
    pub fn update(
        &mut self,
        view: EntityView,
    ) -> bool {
        let id = view.entity_id();
        match self.entities.get_mut(&id) {
            Some(entry) => {
                if !entry.removed && *entry.view == view {
                    return false;
                }
                self.latest_revno += 1;
                self.order.remove(&entry.revno);
                if entry.removed {
                    // Re-creation after removal starts a fresh
                    // lifecycle segment.
                    entry.creation_revno = self.latest_revno;
                    entry.removed = false;
                }
                entry.revno = self.latest_revno;
                entry.view = Arc::new(view);
                self.order.insert(self.latest_revno, id);
                true
            }
            None => {
                self.latest_revno += 1;
                self.entities.insert(
                    id.clone(),
                    EntityEntry {
                        creation_revno: self.latest_revno,
                        revno: self.latest_revno,
                        removed: false,
                        view: Arc::new(view),
                    },
                );
                self.order.insert(self.latest_revno, id);
                true
            }
        }
    }

    /// Mark an entity removed under a fresh revision. At most one
    /// removal is recorded per lifecycle segment; removing an absent or
    /// already-removed entity is a no-op returning false.
    pub fn remove(
        &mut self,
        id: &EntityId,
    ) -> bool {
        match self.entities.get_mut(id) {
            Some(entry) if !entry.removed => {
                self.latest_revno += 1;
                self.order.remove(&entry.revno);
                entry.removed = true;
                entry.revno = self.latest_revno;
                self.order.insert(self.latest_revno, id.clone());
                true
            }
            _ => false,
        }
    }

    /// All live views, ordered by (kind, id) for deterministic
    /// enumeration.
    pub fn all(&self) -> Vec<Arc<EntityView>> {
        let mut live: Vec<(&EntityId, &EntityEntry)> =
            self.entities.iter().filter(|(_, e)| !e.removed).collect();
        live.sort_by(|a, b| a.0.cmp(b.0));
        live.into_iter().map(|(_, e)| e.view.clone()).collect()
    }

    /// Identities of all live entities. Used by resync sweeps.
    pub fn live_identities(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, e)| !e.removed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Deltas for everything that changed after `revno`, oldest first.
    /// Entities both created and removed inside the window are skipped:
    /// a cursor that never saw the create has nothing to remove.
    pub fn changes_since(
        &self,
        revno: u64,
    ) -> Vec<Delta> {
        let mut deltas = Vec::new();
        for id in self.order.range(revno + 1..).map(|(_, id)| id) {
            let entry = &self.entities[id];
            if entry.removed {
                if entry.creation_revno > revno {
                    continue;
                }
                deltas.push(Delta::removal(id.clone()));
            } else {
                deltas.push(Delta::upsert(id.clone(), entry.view.clone()));
            }
        }
        deltas
    }

    /// Drop removed entries whose removal every attached cursor has
    /// observed (revision at or below the horizon).
    pub fn purge_removed_through(
        &mut self,
        horizon: u64,
    ) {
        let purgeable: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.removed && e.revno <= horizon)
            .map(|(id, _)| id.clone())
            .collect();
        for id in purgeable {
            if let Some(entry) = self.entities.remove(&id) {
                self.order.remove(&entry.revno);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn entry_count(&self) -> usize {
        self.entities.len()
    }
}
