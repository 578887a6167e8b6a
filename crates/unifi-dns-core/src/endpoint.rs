//! Managed DNS records as the reconciliation core understands them
//!
//! An [`Endpoint`] is one name/type pair with one or more target values.
//! A [`ChangeSet`] is the batch of creates/updates/deletes computed by
//! external-dns for one reconciliation round.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// TTL applied when neither the endpoint nor the remote record carries one
pub const DEFAULT_TTL: u32 = 300;

/// DNS record type
///
/// Only the seven named types are managed. Anything else read from the
/// remote controller or the wire is carried as [`RecordType::Other`] so it
/// can be skipped rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Canonical name
    Cname,
    /// Mail exchanger
    Mx,
    /// Name server
    Ns,
    /// Service locator
    Srv,
    /// Text
    Txt,
    /// A type outside the managed set
    Other(String),
}

impl RecordType {
    /// Every managed record type
    pub const SUPPORTED: [RecordType; 7] = [
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Ns,
        RecordType::Srv,
        RecordType::Txt,
    ];

    /// Canonical upper-case name
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
            RecordType::Other(name) => name,
        }
    }

    /// Whether this type is in the managed set
    pub fn is_supported(&self) -> bool {
        !matches!(self, RecordType::Other(_))
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            "CNAME" => RecordType::Cname,
            "MX" => RecordType::Mx,
            "NS" => RecordType::Ns,
            "SRV" => RecordType::Srv,
            "TXT" => RecordType::Txt,
            _ => RecordType::Other(s.to_string()),
        })
    }
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(record_type) => record_type,
            Err(never) => match never {},
        }
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        RecordType::from(s.as_str())
    }
}

impl From<RecordType> for String {
    fn from(record_type: RecordType) -> Self {
        record_type.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque provider-specific key/value carried through from external-dns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpecificProperty {
    /// Property name
    pub name: String,
    /// Property value
    pub value: String,
}

/// A desired or observed DNS record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Fully-qualified record name
    pub name: String,

    /// Record type
    pub record_type: RecordType,

    /// TTL in seconds; `None` means "use the default"
    pub ttl: Option<u32>,

    /// Target values. More than one target means round-robin records,
    /// materialised remotely as one record per target.
    pub targets: Vec<String>,

    /// external-dns set identifier; not stored remotely
    pub set_identifier: String,

    /// external-dns labels; not stored remotely
    pub labels: BTreeMap<String, String>,

    /// Provider-specific properties; not stored remotely
    pub provider_specific: Vec<ProviderSpecificProperty>,
}

impl Endpoint {
    /// Create an endpoint with no explicit TTL
    pub fn new(
        name: impl Into<String>,
        record_type: impl Into<RecordType>,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            record_type: record_type.into(),
            ttl: None,
            targets: targets.into_iter().map(Into::into).collect(),
            set_identifier: String::new(),
            labels: BTreeMap::new(),
            provider_specific: Vec::new(),
        }
    }

    /// Set the TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// TTL to use, falling back to [`DEFAULT_TTL`] when unset or zero
    pub fn effective_ttl(&self) -> u32 {
        match self.ttl {
            Some(ttl) if ttl > 0 => ttl,
            _ => DEFAULT_TTL,
        }
    }
}

/// Batch of changes for one `apply_changes` call
///
/// `update_old` and `update_new` are not paired positionally: an update is
/// "delete everything that existed under these names" followed by "create
/// everything that should exist now".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Endpoints to create
    pub create: Vec<Endpoint>,
    /// Endpoints as they were before an update
    pub update_old: Vec<Endpoint>,
    /// Endpoints as they should be after an update
    pub update_new: Vec<Endpoint>,
    /// Endpoints to delete
    pub delete: Vec<Endpoint>,
}

impl ChangeSet {
    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.update_old.is_empty()
            && self.update_new.is_empty()
            && self.delete.is_empty()
    }
}
