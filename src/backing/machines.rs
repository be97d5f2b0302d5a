use async_trait::async_trait;

use super::decode;
use super::machine_global_key;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::InstanceDataDoc;
use super::MachineDoc;
use super::ReconcileContext;
use super::ReconcileOutcome;
use super::StatusDoc;
use crate::constants;
use crate::EntityId;
use crate::EntityView;
use crate::HardwareSpec;
use crate::MachineView;
use crate::ReconcileError;

pub(crate) struct MachinesHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for MachinesHandler {
    fn collection(&self) -> &'static str {
        constants::MACHINES
    }

    fn primary(&self) -> bool {
        true
    }

    fn primary_entity(
        &self,
        id: &str,
    ) -> Option<EntityId> {
        Some(EntityId::machine(id))
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let doc: MachineDoc = decode(constants::MACHINES, id, doc)?;
        if doc.id.is_empty() {
            return Err(ReconcileError::InvalidEntity {
                id: EntityId::machine(id),
                reason: "machine document has no id".into(),
            });
        }

        let mut view = MachineView {
            id: doc.id.clone(),
            life: doc.life,
            series: doc.series,
            jobs: doc.jobs,
            addresses: doc.addresses,
            supported_containers: doc.supported_containers,
            ..Default::default()
        };

        match ctx.store.get(&EntityId::machine(&doc.id)) {
            Some(old) => {
                // The entry already exists; preserve the current status
                // and instance data rather than re-reading them.
                if let EntityView::Machine(old) = old.as_ref() {
                    view.status = old.status;
                    view.status_info = old.status_info.clone();
                    view.status_data = old.status_data.clone();
                    view.instance_id = old.instance_id.clone();
                    view.hardware = old.hardware.clone();
                }
            }
            None => {
                // First sighting; fetch the associated agent status.
                if let Some(sdoc) = ctx
                    .reader
                    .get(constants::STATUSES, &machine_global_key(&doc.id))
                    .await?
                {
                    let sdoc: StatusDoc = decode(constants::STATUSES, id, sdoc)?;
                    view.status = sdoc.status;
                    view.status_info = sdoc.status_info;
                    view.status_data = sdoc.status_data;
                }
            }
        }

        // A provisioned machine without a known instance id gets its
        // instance data resolved here.
        let provisioned = doc.nonce.as_deref().is_some_and(|n| !n.is_empty());
        if provisioned && view.instance_id.is_none() {
            if let Some(idoc) = ctx.reader.get(constants::INSTANCE_DATA, &doc.id).await? {
                let idoc: InstanceDataDoc = decode(constants::INSTANCE_DATA, id, idoc)?;
                view.instance_id = Some(idoc.instance_id);
                view.hardware = Some(HardwareSpec {
                    arch: idoc.arch,
                    mem_mb: idoc.mem_mb,
                    cpu_cores: idoc.cpu_cores,
                    cpu_power: idoc.cpu_power,
                });
            }
        }

        out.upsert(EntityView::Machine(view));
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        out.remove(EntityId::machine(id));
        Ok(())
    }
}
