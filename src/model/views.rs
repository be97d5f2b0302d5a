//! The denormalized, delta-friendly snapshots of each entity kind.
//!
//! Views are value objects: once a view has been attached to an emitted
//! [`Delta`] it is never mutated in place. Any further change to the
//! entity produces a new view behind a new `Arc`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::Address;
use super::Constraints;
use super::Endpoint;
use super::EntityId;
use super::EntityKind;
use super::HardwareSpec;
use super::Life;
use super::MachineJob;
use super::Port;
use super::PortRange;
use super::Status;
use super::StatusData;

/// Charm settings of an application, keyed by option name.
pub type ConfigMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineView {
    pub id: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub status_info: String,
    #[serde(default)]
    pub status_data: StatusData,
    #[serde(default)]
    pub life: Life,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub jobs: Vec<MachineJob>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub hardware: Option<HardwareSpec>,
    /// `None` until the machine agent has reported what it supports.
    #[serde(default)]
    pub supported_containers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitView {
    pub name: String,
    pub application: String,
    #[serde(default)]
    pub series: String,
    /// Identity of the assigned machine; resolved by lookup, never an
    /// embedded machine view.
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub public_address: Option<String>,
    #[serde(default)]
    pub private_address: Option<String>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub port_ranges: Vec<PortRange>,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub status_info: String,
    #[serde(default)]
    pub status_data: StatusData,
    #[serde(default)]
    pub subordinate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationView {
    pub name: String,
    #[serde(default)]
    pub exposed: bool,
    pub charm_url: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub life: Life,
    #[serde(default)]
    pub min_units: u32,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub config: ConfigMap,
    #[serde(default)]
    pub subordinate: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationView {
    pub key: String,
    pub id: u64,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationView {
    pub tag: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// The denormalized snapshot of one entity, dispatched by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EntityView {
    Annotation(AnnotationView),
    Application(ApplicationView),
    Machine(MachineView),
    Relation(RelationView),
    Unit(UnitView),
}

impl EntityView {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityView::Annotation(_) => EntityKind::Annotation,
            EntityView::Application(_) => EntityKind::Application,
            EntityView::Machine(_) => EntityKind::Machine,
            EntityView::Relation(_) => EntityKind::Relation,
            EntityView::Unit(_) => EntityKind::Unit,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        match self {
            EntityView::Annotation(a) => EntityId::annotation(a.tag.clone()),
            EntityView::Application(a) => EntityId::application(a.name.clone()),
            EntityView::Machine(m) => EntityId::machine(m.id.clone()),
            EntityView::Relation(r) => EntityId::relation(r.key.clone()),
            EntityView::Unit(u) => EntityId::unit(u.name.clone()),
        }
    }
}

/// One unit of output: an entity changed (`view` carries the full
/// current snapshot) or was removed (`view` is `None`).
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub id: EntityId,
    pub removed: bool,
    pub view: Option<Arc<EntityView>>,
}

impl Delta {
    pub fn upsert(
        id: EntityId,
        view: Arc<EntityView>,
    ) -> Self {
        Self {
            id,
            removed: false,
            view: Some(view),
        }
    }

    pub fn removal(id: EntityId) -> Self {
        Self {
            id,
            removed: true,
            view: None,
        }
    }
}
