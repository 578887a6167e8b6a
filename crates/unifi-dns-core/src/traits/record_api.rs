// # Record API Trait
//
// Defines the narrow interface to the remote controller's record store.
//
// ## Implementations
//
// - UniFi Network: `unifi-dns-client` crate
// - Tests: recording doubles under `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use unifi_dns_core::RecordApi;
//
// let records = api.list_records("default").await?;
// for record in records {
//     println!("{} {} {}", record.name, record.record_type, record.value);
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::endpoint::RecordType;

/// A record as the remote controller stores it: exactly one value per record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Opaque record ID assigned by the controller
    pub id: String,
    /// Record name
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// The single record value
    pub value: String,
    /// TTL, if the controller stores one
    pub ttl: Option<u32>,
}

/// Fields sent to the controller to create one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecordInput {
    /// Record name
    pub name: String,
    /// Record type (always a managed type)
    pub record_type: RecordType,
    /// The single record value
    pub value: String,
    /// TTL; must be `None` for TXT records
    pub ttl: Option<u32>,
    /// Whether the controller should serve the record
    pub enabled: bool,
}

/// Trait for the remote record store
///
/// The reconciliation engine only ever lists, creates and deletes. Updates
/// are expressed as delete followed by create.
///
/// # Thread Safety
///
/// Implementations are shared across concurrently running workers and must
/// do any locking they need internally.
///
/// # Failure Semantics
///
/// - Implementations must NOT retry; retry policy belongs to the caller of
///   the engine (external-dns re-runs the whole reconciliation).
/// - Deleting an ID that no longer exists may or may not surface as an
///   error; callers must not rely on distinguishing it.
#[async_trait]
pub trait RecordApi: Send + Sync {
    /// List every record of a site
    async fn list_records(&self, site: &str) -> Result<Vec<RemoteRecord>, crate::Error>;

    /// Create one record and return it with its assigned ID
    async fn create_record(
        &self,
        site: &str,
        record: &RemoteRecordInput,
    ) -> Result<RemoteRecord, crate::Error>;

    /// Delete one record by ID
    async fn delete_record(&self, site: &str, record_id: &str) -> Result<(), crate::Error>;

    /// Name of the remote API (for logging/debugging)
    fn api_name(&self) -> &'static str;
}
