//! Test doubles and common utilities for behavioural contract tests
//!
//! `RecordingApi` is an in-memory record store that logs every call and can
//! be told to fail, stall or hang for chosen names. `CountingProvider`
//! counts readiness probes.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use unifi_dns_core::error::{Error, Result};
use unifi_dns_core::{
    ChangeSet, DnsProvider, DomainFilter, Endpoint, RecordApi, RecordType, RemoteRecord,
    RemoteRecordInput,
};

/// One observed call against the record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Create { name: String, value: String },
    Delete { id: String },
}

/// In-memory record store that records what the engine asked of it
pub struct RecordingApi {
    records: Mutex<Vec<RemoteRecord>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicUsize,
    /// Creations for these names fail
    failing_creates: Mutex<HashSet<String>>,
    /// Deletions of these IDs fail
    failing_deletes: Mutex<HashSet<String>>,
    /// Creations for these names never complete
    hanging_creates: Mutex<HashSet<String>>,
    fail_listing: AtomicBool,
    /// Deleting an ID the store does not hold reports NotFound
    strict_deletes: AtomicBool,
    /// Removed from the store right after the next listing is served
    vanishing: Mutex<HashSet<String>>,
    /// Simulated latency of each create/delete
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            failing_creates: Mutex::new(HashSet::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            hanging_creates: Mutex::new(HashSet::new()),
            fail_listing: AtomicBool::new(false),
            strict_deletes: AtomicBool::new(false),
            vanishing: Mutex::new(HashSet::new()),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Add a pre-existing record and return its ID
    pub fn seed(&self, name: &str, record_type: &str, value: &str) -> String {
        let id = format!("seed-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(RemoteRecord {
            id: id.clone(),
            name: name.to_string(),
            record_type: RecordType::from(record_type),
            value: value.to_string(),
            ttl: None,
        });
        id
    }

    pub fn fail_creates_for(&self, name: &str) {
        self.failing_creates.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_delete_of(&self, id: &str) {
        self.failing_deletes.lock().unwrap().insert(id.to_string());
    }

    pub fn hang_creates_for(&self, name: &str) {
        self.hanging_creates.lock().unwrap().insert(name.to_string());
    }

    /// Answer deletes of unknown IDs the way the controller does: 404
    pub fn reject_unknown_deletes(&self) {
        self.strict_deletes.store(true, Ordering::SeqCst);
    }

    /// Drop `id` behind the engine's back once it has been listed
    pub fn vanish_after_listing(&self, id: &str) {
        self.vanishing.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_listing(&self) {
        self.fail_listing.store(true, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Every call in the order it started
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn list_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::List)).count()
    }

    pub fn create_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Create { .. })).count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Delete { .. })).count()
    }

    /// Current contents of the store
    pub fn records(&self) -> Vec<RemoteRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Sorted (name, value) pairs currently stored
    pub fn contents(&self) -> Vec<(String, String)> {
        let mut contents: Vec<_> = self
            .records()
            .into_iter()
            .map(|r| (r.name, r.value))
            .collect();
        contents.sort();
        contents
    }

    /// Highest number of creates/deletes observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn mutation<T>(&self, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let outcome = work();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[async_trait]
impl RecordApi for RecordingApi {
    async fn list_records(&self, _site: &str) -> Result<Vec<RemoteRecord>> {
        self.calls.lock().unwrap().push(Call::List);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::http("connection refused"));
        }
        let listing = self.records();

        let vanishing: HashSet<String> = self.vanishing.lock().unwrap().drain().collect();
        if !vanishing.is_empty() {
            self.records.lock().unwrap().retain(|r| !vanishing.contains(&r.id));
        }

        Ok(listing)
    }

    async fn create_record(&self, _site: &str, input: &RemoteRecordInput) -> Result<RemoteRecord> {
        self.calls.lock().unwrap().push(Call::Create {
            name: input.name.clone(),
            value: input.value.clone(),
        });

        if self.hanging_creates.lock().unwrap().contains(&input.name) {
            std::future::pending::<()>().await;
        }

        self.mutation(|| {
            if self.failing_creates.lock().unwrap().contains(&input.name) {
                return Err(Error::api("unifi", format!("rejected {}", input.value)));
            }

            let record = RemoteRecord {
                id: format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
                name: input.name.clone(),
                record_type: input.record_type.clone(),
                value: input.value.clone(),
                ttl: input.ttl,
            };
            self.records.lock().unwrap().push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn delete_record(&self, _site: &str, record_id: &str) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Delete {
            id: record_id.to_string(),
        });

        self.mutation(|| {
            if self.failing_deletes.lock().unwrap().contains(record_id) {
                return Err(Error::api("unifi", format!("cannot delete {record_id}")));
            }

            let mut records = self.records.lock().unwrap();
            let before = records.len();
            records.retain(|r| r.id != record_id);

            if records.len() == before && self.strict_deletes.load(Ordering::SeqCst) {
                return Err(Error::not_found(format!("404 {record_id}")));
            }
            Ok(())
        })
        .await
    }

    fn api_name(&self) -> &'static str {
        "recording"
    }
}

/// A DnsProvider that counts listings, for readiness tests
pub struct CountingProvider {
    probes: Arc<AtomicUsize>,
    failing: AtomicBool,
    latency: Duration,
    filter: DomainFilter,
}

impl CountingProvider {
    pub fn new(latency: Duration) -> Self {
        Self {
            probes: Arc::new(AtomicUsize::new(0)),
            failing: AtomicBool::new(false),
            latency,
            filter: DomainFilter::default(),
        }
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DnsProvider for CountingProvider {
    async fn records(&self, _cancel: &CancellationToken) -> Result<Vec<Endpoint>> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::http("controller unreachable"));
        }
        Ok(Vec::new())
    }

    async fn apply_changes(&self, _cancel: &CancellationToken, _changes: ChangeSet) -> Result<()> {
        Ok(())
    }

    fn domain_filter(&self) -> &DomainFilter {
        &self.filter
    }
}

/// Shorthand for an endpoint
pub fn endpoint(name: &str, record_type: &str, targets: &[&str]) -> Endpoint {
    Endpoint::new(name, record_type, targets.iter().copied())
}

/// Metrics sink that keeps what it was told
#[derive(Default)]
pub struct RecordingMetrics {
    /// (operation, success) per finished unit
    pub operations: Mutex<Vec<(&'static str, bool)>>,
    /// Duration reported for each finished unit
    pub durations: Mutex<Vec<Duration>>,
    /// (record type, count) per gauge update
    pub managed: Mutex<Vec<(String, usize)>>,
    /// (change type, size) per incoming phase
    pub changes: Mutex<Vec<(&'static str, usize)>>,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
}

impl RecordingMetrics {
    pub fn operations(&self) -> Vec<(&'static str, bool)> {
        self.operations.lock().unwrap().clone()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.durations.lock().unwrap().clone()
    }

    pub fn managed(&self, record_type: &str) -> Option<usize> {
        self.managed
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(t, _)| t == record_type)
            .map(|(_, count)| *count)
    }

    pub fn changes(&self) -> Vec<(&'static str, usize)> {
        self.changes.lock().unwrap().clone()
    }
}

impl unifi_dns_core::MetricsRecorder for RecordingMetrics {
    fn record_operation(&self, operation: unifi_dns_core::Operation, success: bool, duration: Duration) {
        self.operations
            .lock()
            .unwrap()
            .push((operation.as_str(), success));
        self.durations.lock().unwrap().push(duration);
    }

    fn set_records_managed(&self, record_type: &str, count: usize) {
        self.managed
            .lock()
            .unwrap()
            .push((record_type.to_string(), count));
    }

    fn observe_changes(&self, operation: unifi_dns_core::Operation, count: usize) {
        self.changes.lock().unwrap().push((operation.as_str(), count));
    }

    fn readiness_cache_hit(&self, _age: Duration) {
        self.cache_hits.fetch_add(1, Ordering::SeqCst);
    }

    fn readiness_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::SeqCst);
    }
}
