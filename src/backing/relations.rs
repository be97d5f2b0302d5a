use async_trait::async_trait;

use super::decode;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use super::RelationDoc;
use crate::constants;
use crate::EntityId;
use crate::EntityView;
use crate::ReconcileError;
use crate::RelationView;

pub(crate) struct RelationsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for RelationsHandler {
    fn collection(&self) -> &'static str {
        constants::RELATIONS
    }

    fn primary(&self) -> bool {
        true
    }

    fn primary_entity(
        &self,
        id: &str,
    ) -> Option<EntityId> {
        Some(EntityId::relation(id))
    }

    async fn updated(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let doc: RelationDoc = decode(constants::RELATIONS, id, doc)?;
        if doc.key.is_empty() {
            return Err(ReconcileError::InvalidEntity {
                id: EntityId::relation(id),
                reason: "relation document has no key".into(),
            });
        }
        out.upsert(EntityView::Relation(RelationView {
            key: doc.key,
            id: doc.id,
            endpoints: doc.endpoints,
        }));
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        out.remove(EntityId::relation(id));
        Ok(())
    }
}
