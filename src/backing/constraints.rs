use async_trait::async_trait;
use tracing::trace;

use super::decode;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use crate::constants;
use crate::Constraints;
use crate::EntityId;
use crate::EntityView;
use crate::ReconcileError;

/// Constraints documents keyed `a#<name>` surface on the owning
/// application's view. Machine and unit scoped constraint keys carry
/// no watchable state and are ignored.
pub(crate) struct ConstraintsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for ConstraintsHandler {
    fn collection(&self) -> &'static str {
        constants::CONSTRAINTS
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let Some(name) = id.strip_prefix(constants::APPLICATION_PREFIX) else {
            trace!(id, "ignoring constraints change with non-application scope");
            return Ok(());
        };
        let Some(old) = ctx.store.get(&EntityId::application(name)) else {
            return Ok(());
        };
        if let EntityView::Application(app) = old.as_ref() {
            let constraints: Constraints = decode(constants::CONSTRAINTS, id, doc)?;
            let mut view = app.clone();
            view.constraints = constraints;
            out.upsert(EntityView::Application(view));
        }
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        _id: &str,
        _out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        Ok(())
    }
}
