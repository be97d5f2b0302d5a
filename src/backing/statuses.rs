use async_trait::async_trait;
use tracing::trace;

use super::decode;
use super::parse_owner_key;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use super::StatusDoc;
use crate::constants;
use crate::EntityKind;
use crate::EntityView;
use crate::ReconcileError;

/// Status records are keyed by the entity they describe (`m#0`,
/// `u#wordpress/0`) and surface as field mutations on that entity's
/// view. A status for an entity not in the store is ignored; the
/// entity's own first sighting reads it.
pub(crate) struct StatusesHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for StatusesHandler {
    fn collection(&self) -> &'static str {
        constants::STATUSES
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let Some(owner) = parse_owner_key(id) else {
            trace!(id, "ignoring status change with unknown scope");
            return Ok(());
        };
        if !matches!(owner.kind, EntityKind::Machine | EntityKind::Unit) {
            return Ok(());
        }
        let Some(old) = ctx.store.get(&owner) else {
            return Ok(());
        };
        let sdoc: StatusDoc = decode(constants::STATUSES, id, doc)?;
        match old.as_ref() {
            EntityView::Machine(m) => {
                let mut view = m.clone();
                view.status = sdoc.status;
                view.status_info = sdoc.status_info;
                view.status_data = sdoc.status_data;
                out.upsert(EntityView::Machine(view));
            }
            EntityView::Unit(u) => {
                let mut view = u.clone();
                view.status = sdoc.status;
                view.status_info = sdoc.status_info;
                view.status_data = sdoc.status_data;
                out.upsert(EntityView::Unit(view));
            }
            _ => {}
        }
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        _id: &str,
        _out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        // Status documents only disappear together with their owner;
        // the owner's removal covers it.
        Ok(())
    }
}
