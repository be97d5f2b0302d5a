//! Typed decodings of the raw persisted documents. Documents are
//! free-form field mappings; each handler decodes just the fields it
//! derives view state from and tolerates everything else.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::Address;
use crate::Document;
use crate::Endpoint;
use crate::Life;
use crate::MachineJob;
use crate::Protocol;
use crate::ReconcileError;
use crate::Status;
use crate::StatusData;

pub(crate) fn decode<T: DeserializeOwned>(
    collection: &'static str,
    id: &str,
    doc: Document,
) -> Result<T, ReconcileError> {
    serde_json::from_value(doc).map_err(|source| ReconcileError::Malformed {
        collection,
        id: id.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MachineDoc {
    pub id: String,
    #[serde(default)]
    pub life: Life,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub jobs: Vec<MachineJob>,
    /// Set once the provisioner has handed the machine to an instance.
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub supported_containers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct InstanceDataDoc {
    pub instance_id: String,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub mem_mb: Option<u64>,
    #[serde(default)]
    pub cpu_cores: Option<u64>,
    #[serde(default)]
    pub cpu_power: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UnitDoc {
    pub name: String,
    pub application: String,
    #[serde(default)]
    pub series: String,
    #[serde(default)]
    pub machine_id: Option<String>,
    /// Name of the principal unit this one is subordinate to.
    #[serde(default)]
    pub principal: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApplicationDoc {
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
    pub subordinate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RelationDoc {
    pub key: String,
    pub id: u64,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AnnotationDoc {
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StatusDoc {
    pub status: Status,
    #[serde(default)]
    pub status_info: String,
    #[serde(default)]
    pub status_data: StatusData,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PortsDoc {
    #[serde(default)]
    pub ports: Vec<PortRangeEntry>,
}

/// One opened range inside a machine's ports document, tagged with the
/// unit that opened it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PortRangeEntry {
    pub unit_name: String,
    pub from_port: u16,
    pub to_port: u16,
    pub protocol: Protocol,
}
