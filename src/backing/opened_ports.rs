use async_trait::async_trait;
use futures::future::join_all;
use tracing::trace;

use super::decode;
use super::parse_ports_key;
use super::units::build_unit_view;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::ReconcileContext;
use super::ReconcileOutcome;
use super::UnitDoc;
use crate::constants;
use crate::EntityId;
use crate::EntityView;
use crate::ReconcileError;
use crate::UnitView;

/// A ports document is keyed by machine and network
/// (`m#0#n#juju-public`) but its contents surface on the views of the
/// units placed on that machine. Every affected unit is recomputed
/// independently; one owner failing never blocks the others.
pub(crate) struct OpenedPortsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for OpenedPortsHandler {
    fn collection(&self) -> &'static str {
        constants::OPENED_PORTS
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        _doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        self.refresh_machine_units(ctx, id, out).await
    }

    async fn removed(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        // A vanished ports document means the units now hold nothing
        // open; the same recomputation covers it.
        self.refresh_machine_units(ctx, id, out).await
    }
}

impl OpenedPortsHandler {
    async fn refresh_machine_units<S: DocumentStore>(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let Some(machine_id) = parse_ports_key(id) else {
            trace!(id, "ignoring ports change with unparseable key");
            return Ok(());
        };

        let mut targets = Vec::new();
        for (unit_id, doc) in ctx.reader.list(constants::UNITS).await? {
            match decode::<UnitDoc>(constants::UNITS, &unit_id, doc) {
                Ok(unit) => {
                    if unit.machine_id.as_deref() == Some(machine_id) {
                        targets.push(unit_id);
                    }
                }
                Err(e) => out.failures.push(ReconcileError::OwnerFailed {
                    id: EntityId::unit(unit_id),
                    source: Box::new(e),
                }),
            }
        }

        let refreshed = join_all(
            targets
                .into_iter()
                .map(|unit_id| async move { (refresh_unit(ctx, &unit_id).await, unit_id) }),
        )
        .await;

        for (result, unit_id) in refreshed {
            match result {
                Ok(Some(view)) => out.upsert(EntityView::Unit(view)),
                // The unit vanished between the scan and the re-read;
                // its own change notification handles the removal.
                Ok(None) => {}
                Err(e) => out.failures.push(ReconcileError::OwnerFailed {
                    id: EntityId::unit(unit_id),
                    source: Box::new(e),
                }),
            }
        }
        Ok(())
    }
}

/// Independently re-read and rebuild one unit's view. This may create
/// the view before the unit's own document change is next observed.
async fn refresh_unit<S: DocumentStore>(
    ctx: &ReconcileContext<'_, S>,
    unit_id: &str,
) -> Result<Option<UnitView>, ReconcileError> {
    let Some(doc) = ctx.reader.get(constants::UNITS, unit_id).await? else {
        return Ok(None);
    };
    let doc: UnitDoc = decode(constants::UNITS, unit_id, doc)?;
    Ok(Some(build_unit_view(ctx, doc).await?))
}
