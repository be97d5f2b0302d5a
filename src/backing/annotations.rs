use async_trait::async_trait;
use tracing::trace;

use super::decode;
use super::parse_owner_key;
use super::AnnotationDoc;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use crate::constants;
use crate::AnnotationView;
use crate::EntityId;
use crate::EntityView;
use crate::ReconcileError;

/// Annotation documents are keyed by the annotated entity's global key
/// but surface as their own entity kind, addressed by tag
/// (`m#0` → `machine-0`). Keys scoped to entities outside the watched
/// set are ignored.
pub(crate) struct AnnotationsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for AnnotationsHandler {
    fn collection(&self) -> &'static str {
        constants::ANNOTATIONS
    }

    fn primary(&self) -> bool {
        true
    }

    fn primary_entity(
        &self,
        id: &str,
    ) -> Option<EntityId> {
        annotation_tag(id).map(EntityId::annotation)
    }

    async fn updated(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let Some(tag) = annotation_tag(id) else {
            trace!(id, "ignoring annotations change with unknown scope");
            return Ok(());
        };
        let doc: AnnotationDoc = decode(constants::ANNOTATIONS, id, doc)?;
        out.upsert(EntityView::Annotation(AnnotationView {
            tag,
            annotations: doc.annotations,
        }));
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        if let Some(tag) = annotation_tag(id) {
            out.remove(EntityId::annotation(tag));
        }
        Ok(())
    }
}

/// `m#0` → `machine-0`, `u#wordpress/0` → `unit-wordpress-0`,
/// `a#wordpress` → `application-wordpress`.
fn annotation_tag(key: &str) -> Option<String> {
    let owner = parse_owner_key(key)?;
    Some(format!(
        "{}-{}",
        owner.kind.as_str(),
        owner.id.replace('/', "-")
    ))
}
