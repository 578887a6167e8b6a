// # unifi-dns-core
//
// Reconciliation core for the external-dns UniFi webhook.
//
// ## Architecture Overview
//
// This library turns external-dns change sets into calls against a router
// controller's record store:
// - **RecordApi**: Trait for the remote record store (list/create/delete)
// - **DnsProvider**: Trait the webhook protocol layer talks to
// - **ReconciliationEngine**: Applies change sets in bounded, phased fan-out
// - **ReadinessCache**: TTL-cached, stampede-free readiness probe
// - **MetricsRecorder**: Injected metrics sink
//
// ## Design Principles
//
// 1. **Phased**: deletes, then updates, then creates; phases never overlap
// 2. **Bounded**: a fixed number of remote mutations in flight, each with a deadline
// 3. **Exhaustive**: inside a phase every item is attempted and every failure reported
// 4. **Library-First**: no global state; logging, metrics and cancellation are injected

pub mod config;
pub mod convert;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod filter;
pub mod index;
pub mod readiness;
pub mod traits;

// Re-export core types for convenience
pub use config::{LogFormat, WebhookConfig};
pub use endpoint::{ChangeSet, DEFAULT_TTL, Endpoint, ProviderSpecificProperty, RecordType};
pub use engine::{ConcurrencyLimiter, ReconciliationEngine};
pub use error::{AggregateError, Error, ErrorAggregator, Result};
pub use filter::DomainFilter;
pub use index::RecordIndex;
pub use readiness::{DEFAULT_READINESS_TTL, ReadinessCache};
pub use traits::{
    DnsProvider, MetricsRecorder, NoopRecorder, Operation, RecordApi, RemoteRecord,
    RemoteRecordInput,
};
pub use tokio_util::sync::CancellationToken;
