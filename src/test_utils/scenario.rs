//! Document builders for test topologies. Field layouts mirror what
//! the collection handlers decode.

use serde_json::json;

use crate::Document;

pub fn machine_doc(
    id: &str,
    series: &str,
) -> Document {
    json!({
        "id": id,
        "life": "alive",
        "series": series,
        "jobs": ["host-units"],
    })
}

pub fn provisioned_machine_doc(
    id: &str,
    series: &str,
    nonce: &str,
) -> Document {
    json!({
        "id": id,
        "life": "alive",
        "series": series,
        "jobs": ["host-units"],
        "nonce": nonce,
    })
}

pub fn machine_doc_with_addresses(
    id: &str,
    series: &str,
    addresses: &[(&str, &str)],
) -> Document {
    let addresses: Vec<_> = addresses
        .iter()
        .map(|(value, scope)| json!({"value": value, "scope": scope}))
        .collect();
    json!({
        "id": id,
        "life": "alive",
        "series": series,
        "jobs": ["host-units"],
        "addresses": addresses,
    })
}

pub fn instance_data_doc(
    instance_id: &str,
    arch: Option<&str>,
    mem_mb: Option<u64>,
) -> Document {
    json!({
        "instance_id": instance_id,
        "arch": arch,
        "mem_mb": mem_mb,
    })
}

pub fn unit_doc(
    name: &str,
    application: &str,
    machine_id: Option<&str>,
) -> Document {
    json!({
        "name": name,
        "application": application,
        "series": "quantal",
        "machine_id": machine_id,
    })
}

pub fn subordinate_unit_doc(
    name: &str,
    application: &str,
    principal: &str,
) -> Document {
    json!({
        "name": name,
        "application": application,
        "series": "quantal",
        "principal": principal,
    })
}

pub fn application_doc(
    name: &str,
    charm_url: &str,
) -> Document {
    json!({
        "name": name,
        "charm_url": charm_url,
        "owner": "user-admin",
        "life": "alive",
    })
}

pub fn exposed_application_doc(
    name: &str,
    charm_url: &str,
    min_units: u32,
) -> Document {
    json!({
        "name": name,
        "charm_url": charm_url,
        "owner": "user-admin",
        "life": "alive",
        "exposed": true,
        "min_units": min_units,
    })
}

pub fn relation_doc(
    key: &str,
    id: u64,
) -> Document {
    json!({
        "key": key,
        "id": id,
        "endpoints": [
            {
                "application": "logging",
                "relation": {
                    "name": "logging-directory",
                    "role": "requirer",
                    "interface": "logging",
                    "limit": 1,
                    "scope": "container",
                },
            },
            {
                "application": "wordpress",
                "relation": {
                    "name": "logging-dir",
                    "role": "provider",
                    "interface": "logging",
                    "scope": "container",
                },
            },
        ],
    })
}

pub fn annotation_doc(pairs: &[(&str, &str)]) -> Document {
    let annotations: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    json!({ "annotations": annotations })
}

pub fn status_doc(
    status: &str,
    info: &str,
) -> Document {
    json!({
        "status": status,
        "status_info": info,
    })
}

pub fn status_doc_with_data(
    status: &str,
    info: &str,
    data: Document,
) -> Document {
    json!({
        "status": status,
        "status_info": info,
        "status_data": data,
    })
}

/// A machine's opened-ports document: `(unit, from, to, protocol)`.
pub fn ports_doc(entries: &[(&str, u16, u16, &str)]) -> Document {
    let ports: Vec<_> = entries
        .iter()
        .map(|(unit, from, to, protocol)| {
            json!({
                "unit_name": unit,
                "from_port": from,
                "to_port": to,
                "protocol": protocol,
            })
        })
        .collect();
    json!({ "ports": ports })
}

pub fn settings_doc(pairs: &[(&str, &str)]) -> Document {
    let fields: serde_json::Map<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    serde_json::Value::Object(fields)
}

pub fn constraints_doc(
    mem_mb: Option<u64>,
    cpu_cores: Option<u64>,
) -> Document {
    json!({
        "mem_mb": mem_mb,
        "cpu_cores": cpu_cores,
    })
}
