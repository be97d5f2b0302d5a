use async_trait::async_trait;

use super::application_global_key;
use super::decode;
use super::settings::settings_map;
use super::settings_global_key;
use super::ApplicationDoc;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use crate::constants;
use crate::ApplicationView;
use crate::Constraints;
use crate::EntityId;
use crate::EntityView;
use crate::ReconcileError;

pub(crate) struct ApplicationsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for ApplicationsHandler {
    fn collection(&self) -> &'static str {
        constants::APPLICATIONS
    }

    fn primary(&self) -> bool {
        true
    }

    fn primary_entity(
        &self,
        id: &str,
    ) -> Option<EntityId> {
        Some(EntityId::application(id))
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let doc: ApplicationDoc = decode(constants::APPLICATIONS, id, doc)?;
        if doc.charm_url.is_empty() {
            return Err(ReconcileError::InvalidEntity {
                id: EntityId::application(doc.name.clone()),
                reason: "application document has no charm url".into(),
            });
        }

        let mut view = ApplicationView {
            name: doc.name.clone(),
            exposed: doc.exposed,
            charm_url: doc.charm_url,
            owner: doc.owner,
            life: doc.life,
            min_units: doc.min_units,
            subordinate: doc.subordinate,
            ..Default::default()
        };

        let mut need_config = true;
        match ctx.store.get(&EntityId::application(&doc.name)) {
            Some(old) => {
                if let EntityView::Application(old) = old.as_ref() {
                    // Constraints arrive through their own collection;
                    // preserve them. Config only stays valid while the
                    // charm url does.
                    view.constraints = old.constraints.clone();
                    if old.charm_url == view.charm_url {
                        view.config = old.config.clone();
                        need_config = false;
                    }
                }
            }
            None => {
                if let Some(cdoc) = ctx
                    .reader
                    .get(constants::CONSTRAINTS, &application_global_key(&doc.name))
                    .await?
                {
                    let constraints: Constraints =
                        decode(constants::CONSTRAINTS, &doc.name, cdoc)?;
                    view.constraints = constraints;
                }
            }
        }

        if need_config {
            if let Some(sdoc) = ctx
                .reader
                .get(
                    constants::SETTINGS,
                    &settings_global_key(&doc.name, &view.charm_url),
                )
                .await?
            {
                view.config = settings_map(&sdoc);
            }
        }

        out.upsert(EntityView::Application(view));
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        out.remove(EntityId::application(id));
        Ok(())
    }
}
