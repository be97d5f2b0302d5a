//! Shared value types of the denormalized views: lifecycle, status,
//! addressing, ports and placement constraints.

use serde::Deserialize;
use serde::Serialize;

/// Lifecycle state of a persisted entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    #[default]
    Alive,
    Dying,
    Dead,
}

/// Agent status of a machine or unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Started,
    Error,
    Stopped,
    Down,
}

/// Free-form structured payload attached to an error status.
pub type StatusData = serde_json::Map<String, serde_json::Value>;

/// Jobs a machine agent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MachineJob {
    HostUnits,
    ManageModel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressScope {
    Public,
    CloudLocal,
    MachineLocal,
    LinkLocal,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub value: String,
    #[serde(default)]
    pub scope: AddressScope,
}

/// Pick the address a machine should be reached at from outside the
/// cloud. Exact public scope wins; an unknown-scope address is an
/// acceptable fallback.
pub fn select_public_address(addresses: &[Address]) -> Option<String> {
    select_by_scope(addresses, AddressScope::Public)
}

/// Pick the address for cloud-internal traffic.
pub fn select_internal_address(addresses: &[Address]) -> Option<String> {
    select_by_scope(addresses, AddressScope::CloudLocal)
}

fn select_by_scope(
    addresses: &[Address],
    scope: AddressScope,
) -> Option<String> {
    addresses
        .iter()
        .find(|a| a.scope == scope)
        .or_else(|| addresses.iter().find(|a| a.scope == AddressScope::Unknown))
        .map(|a| a.value.clone())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

/// A single open port on a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Port {
    pub protocol: Protocol,
    pub number: u16,
}

/// A contiguous range of open ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub from_port: u16,
    pub to_port: u16,
    pub protocol: Protocol,
}

/// Expand sorted ranges into the individual ports they cover, ordered
/// by (protocol, number).
pub fn expand_port_ranges(ranges: &[PortRange]) -> Vec<Port> {
    let mut ports: Vec<Port> = ranges
        .iter()
        .flat_map(|r| {
            (r.from_port..=r.to_port).map(|number| Port {
                protocol: r.protocol,
                number,
            })
        })
        .collect();
    ports.sort();
    ports
}

/// Canonical ordering for port ranges: protocol first, then from-port.
pub fn sort_port_ranges(ranges: &mut [PortRange]) {
    ranges.sort_by_key(|r| (r.protocol, r.from_port, r.to_port));
}

/// Placement constraints of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub cpu_cores: Option<u64>,
    #[serde(default)]
    pub cpu_power: Option<u64>,
    #[serde(default)]
    pub mem_mb: Option<u64>,
    #[serde(default)]
    pub root_disk_mb: Option<u64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Hardware characteristics discovered for a provisioned machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSpec {
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub mem_mb: Option<u64>,
    #[serde(default)]
    pub cpu_cores: Option<u64>,
    #[serde(default)]
    pub cpu_power: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    Provider,
    Requirer,
    Peer,
}

/// One side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub application: String,
    pub relation: EndpointRelation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRelation {
    pub name: String,
    pub role: EndpointRole,
    pub interface: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub scope: String,
}
