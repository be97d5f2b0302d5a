use async_trait::async_trait;

use super::decode;
use super::ports_global_key;
use super::unit_global_key;
use super::CollectionHandler;
use super::Document;
use super::DocumentStore;
use super::MachineDoc;
use super::PortsDoc;
use super::ReconcileContext;
use super::ReconcileOutcome;
use super::StatusDoc;
use super::UnitDoc;
use crate::constants;
use crate::expand_port_ranges;
use crate::select_internal_address;
use crate::select_public_address;
use crate::sort_port_ranges;
use crate::EntityId;
use crate::EntityView;
use crate::Port;
use crate::PortRange;
use crate::ReconcileError;
use crate::UnitView;

pub(crate) struct UnitsHandler;

#[async_trait]
impl<S: DocumentStore> CollectionHandler<S> for UnitsHandler {
    fn collection(&self) -> &'static str {
        constants::UNITS
    }

    fn primary(&self) -> bool {
        true
    }

    fn primary_entity(
        &self,
        id: &str,
    ) -> Option<EntityId> {
        Some(EntityId::unit(id))
    }

    async fn updated(
        &self,
        ctx: &ReconcileContext<'_, S>,
        id: &str,
        doc: Document,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        let doc: UnitDoc = decode(constants::UNITS, id, doc)?;
        let view = build_unit_view(ctx, doc).await?;
        out.upsert(EntityView::Unit(view));
        Ok(())
    }

    async fn removed(
        &self,
        _ctx: &ReconcileContext<'_, S>,
        id: &str,
        out: &mut ReconcileOutcome,
    ) -> Result<(), ReconcileError> {
        out.remove(EntityId::unit(id));
        Ok(())
    }
}

/// Recompute the full denormalized view of one unit: status (preserved
/// from the stored view, read on first sighting), addresses from the
/// assigned machine, and open ports from that machine's ports document.
/// Shared with the opened-ports fan-out, which recreates unit views as
/// a side effect of a ports change.
pub(crate) async fn build_unit_view<S: DocumentStore>(
    ctx: &ReconcileContext<'_, S>,
    doc: UnitDoc,
) -> Result<UnitView, ReconcileError> {
    if !doc.name.contains('/') {
        return Err(ReconcileError::InvalidEntity {
            id: EntityId::unit(doc.name.clone()),
            reason: "unit name is not <application>/<number>".into(),
        });
    }

    let mut view = UnitView {
        name: doc.name.clone(),
        application: doc.application,
        series: doc.series,
        machine_id: doc.machine_id,
        subordinate: doc.principal.as_deref().is_some_and(|p| !p.is_empty()),
        ..Default::default()
    };

    match ctx.store.get(&EntityId::unit(&doc.name)) {
        Some(old) => {
            if let EntityView::Unit(old) = old.as_ref() {
                view.status = old.status;
                view.status_info = old.status_info.clone();
                view.status_data = old.status_data.clone();
            }
        }
        None => {
            if let Some(sdoc) = ctx
                .reader
                .get(constants::STATUSES, &unit_global_key(&doc.name))
                .await?
            {
                let sdoc: StatusDoc = decode(constants::STATUSES, &doc.name, sdoc)?;
                view.status = sdoc.status;
                view.status_info = sdoc.status_info;
                view.status_data = sdoc.status_data;
            }
        }
    }

    if let Some(machine_id) = view.machine_id.clone() {
        if let Some(mdoc) = ctx.reader.get(constants::MACHINES, &machine_id).await? {
            let mdoc: MachineDoc = decode(constants::MACHINES, &machine_id, mdoc)?;
            view.public_address = select_public_address(&mdoc.addresses);
            view.private_address = select_internal_address(&mdoc.addresses);
        }
        let (ports, port_ranges) = unit_ports(ctx, &machine_id, &doc.name).await?;
        view.ports = ports;
        view.port_ranges = port_ranges;
    }

    Ok(view)
}

/// Ports a unit holds open, read from its machine's ports document and
/// filtered to the ranges that unit opened.
async fn unit_ports<S: DocumentStore>(
    ctx: &ReconcileContext<'_, S>,
    machine_id: &str,
    unit_name: &str,
) -> Result<(Vec<Port>, Vec<PortRange>), ReconcileError> {
    let key = ports_global_key(machine_id, constants::DEFAULT_NETWORK);
    let Some(doc) = ctx.reader.get(constants::OPENED_PORTS, &key).await? else {
        return Ok((Vec::new(), Vec::new()));
    };
    let doc: PortsDoc = decode(constants::OPENED_PORTS, &key, doc)?;
    let mut ranges: Vec<PortRange> = doc
        .ports
        .iter()
        .filter(|entry| entry.unit_name == unit_name)
        .map(|entry| PortRange {
            from_port: entry.from_port,
            to_port: entry.to_port,
            protocol: entry.protocol,
        })
        .collect();
    sort_port_ranges(&mut ranges);
    Ok((expand_port_ranges(&ranges), ranges))
}
