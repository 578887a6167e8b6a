//! Mapping between endpoints and remote records
//!
//! Stateless. The remote controller holds one value per record, so an
//! endpoint with N targets becomes N creation inputs sharing one name.

use crate::endpoint::{Endpoint, RecordType, DEFAULT_TTL};
use crate::traits::{RemoteRecord, RemoteRecordInput};

/// Convert a remote record to an endpoint
///
/// Returns `None` for record types outside the managed set; those are
/// skipped, never reported.
pub fn to_endpoint(record: &RemoteRecord) -> Option<Endpoint> {
    if !record.record_type.is_supported() {
        return None;
    }

    let endpoint = Endpoint::new(
        record.name.clone(),
        record.record_type.clone(),
        [record.value.clone()],
    );

    Some(endpoint.with_ttl(record.ttl.unwrap_or(DEFAULT_TTL)))
}

/// Build the creation input for one target of an endpoint
///
/// Returns `None` when the endpoint's type is unsupported. TXT records
/// never carry a TTL because the controller rejects one.
pub fn to_remote_input(endpoint: &Endpoint, target: &str) -> Option<RemoteRecordInput> {
    if !endpoint.record_type.is_supported() {
        return None;
    }

    let ttl = match endpoint.record_type {
        RecordType::Txt => None,
        _ => Some(endpoint.effective_ttl()),
    };

    Some(RemoteRecordInput {
        name: endpoint.name.clone(),
        record_type: endpoint.record_type.clone(),
        value: target.to_string(),
        ttl,
        enabled: true,
    })
}

/// Build one creation input per target, skipping unsupported types
pub fn to_remote_inputs(endpoint: &Endpoint) -> Vec<RemoteRecordInput> {
    endpoint
        .targets
        .iter()
        .filter_map(|target| to_remote_input(endpoint, target))
        .collect()
}
