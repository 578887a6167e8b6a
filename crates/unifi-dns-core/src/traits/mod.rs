//! Core traits for the UniFi DNS webhook
//!
//! This module defines the abstract interfaces the reconciliation core is
//! wired through.
//!
//! - [`RecordApi`]: Remote controller record store (list/create/delete)
//! - [`DnsProvider`]: What the webhook protocol layer calls
//! - [`MetricsRecorder`]: Injected metrics sink

pub mod dns_provider;
pub mod metrics;
pub mod record_api;

pub use dns_provider::DnsProvider;
pub use metrics::{MetricsRecorder, NoopRecorder, Operation};
pub use record_api::{RecordApi, RemoteRecord, RemoteRecordInput};
