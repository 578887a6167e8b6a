//! Reconciliation engine
//!
//! The ReconciliationEngine is responsible for:
//! - Listing remote records and turning the managed ones into endpoints
//! - Applying external-dns change sets against the remote record API
//! - Bounding load on the controller while doing so
//!
//! ## Architecture
//!
//! ```text
//!                 ┌───────────────────────┐
//!  ChangeSet ───▶ │  ReconciliationEngine │
//!                 └───────────────────────┘
//!                   │          │         │
//!         ┌─────────┘          │         └──────────┐
//!         ▼                    ▼                    ▼
//! ┌──────────────┐   ┌───────────────────┐   ┌──────────────┐
//! │ RecordIndex  │   │ConcurrencyLimiter │   │ErrorAggregator│
//! │ (per phase)  │   │ (slots + timeout) │   │ (per phase)  │
//! └──────────────┘   └───────────────────┘   └──────────────┘
//!                              │
//!                              ▼
//!                      ┌──────────────┐
//!                      │  RecordApi   │
//!                      └──────────────┘
//! ```
//!
//! ## Apply Flow
//!
//! 1. Delete phase: one listing, one index, fan out deletions
//! 2. Update phase: fresh listing and index, fan out deletions of the old
//!    endpoints, then fan out creations of the new ones
//! 3. Create phase: fan out creations
//!
//! Phases run strictly in that order and the first phase with any failure
//! ends the apply. Inside a phase every item is attempted; failures are
//! aggregated, never short-circuited.

pub mod limiter;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::convert;
use crate::endpoint::{ChangeSet, Endpoint, RecordType};
use crate::error::{Error, ErrorAggregator, Result};
use crate::filter::DomainFilter;
use crate::index::RecordIndex;
use crate::traits::{DnsProvider, MetricsRecorder, NoopRecorder, Operation, RecordApi, RemoteRecord};

pub use limiter::{ConcurrencyLimiter, DEFAULT_MAX_CONCURRENCY, DEFAULT_OPERATION_TIMEOUT};

/// Reconciles external-dns change sets against a remote record store
///
/// ## Threading
///
/// All methods take `&self`; the engine is meant to be wrapped in an `Arc`
/// and shared between request handlers. Concurrent `apply_changes` calls
/// share one [`ConcurrencyLimiter`], so the bound on in-flight remote
/// mutations holds process-wide.
pub struct ReconciliationEngine {
    /// Remote record store
    api: Arc<dyn RecordApi>,

    /// Site (controller tenant) all calls target
    site: Arc<str>,

    /// Which names this engine manages
    domain_filter: DomainFilter,

    /// Slot pool and per-unit deadline for remote mutations
    limiter: ConcurrencyLimiter,

    /// Injected metrics sink
    metrics: Arc<dyn MetricsRecorder>,
}

impl ReconciliationEngine {
    /// Create an engine with the default limiter and no metrics
    pub fn new(api: Arc<dyn RecordApi>, site: impl Into<String>, domain_filter: DomainFilter) -> Self {
        Self {
            api,
            site: Arc::from(site.into()),
            domain_filter,
            limiter: ConcurrencyLimiter::default(),
            metrics: Arc::new(NoopRecorder),
        }
    }

    /// Replace the concurrency limiter
    pub fn with_limiter(mut self, limiter: ConcurrencyLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replace the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Retrieve every managed record that passes the domain filter
    ///
    /// Records of unmanaged types are dropped silently. Output order follows
    /// the remote listing.
    pub async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>> {
        info!(site = %self.site, "fetching DNS records");

        let records = self
            .list(cancel)
            .await
            .map_err(|e| e.context("failed to list DNS records"))?;

        debug!(total_count = records.len(), "received DNS records");

        let mut endpoints = Vec::with_capacity(records.len());
        let mut by_type: HashMap<RecordType, usize> = HashMap::new();

        for record in &records {
            if !self.domain_filter.matches(&record.name) {
                continue;
            }

            if let Some(endpoint) = convert::to_endpoint(record) {
                *by_type.entry(endpoint.record_type.clone()).or_default() += 1;
                endpoints.push(endpoint);
            }
        }

        for record_type in RecordType::SUPPORTED {
            let count = by_type.get(&record_type).copied().unwrap_or(0);
            self.metrics.set_records_managed(record_type.as_str(), count);
        }

        info!(filtered_count = endpoints.len(), "fetched DNS records");
        Ok(endpoints)
    }

    /// Apply a change set: deletions, then updates, then creations
    pub async fn apply_changes(&self, cancel: &CancellationToken, changes: ChangeSet) -> Result<()> {
        info!(
            create = changes.create.len(),
            update = changes.update_new.len(),
            delete = changes.delete.len(),
            "applying DNS changes"
        );

        if changes.is_empty() {
            debug!("no DNS changes to apply");
            return Ok(());
        }

        for (operation, count) in [
            (Operation::Delete, changes.delete.len()),
            (Operation::Update, changes.update_new.len()),
            (Operation::Create, changes.create.len()),
        ] {
            if count > 0 {
                self.metrics.observe_changes(operation, count);
            }
        }

        let ChangeSet {
            create,
            update_old,
            update_new,
            delete,
        } = changes;

        self.apply_deletions(cancel, delete).await?;
        self.apply_updates(cancel, update_old, update_new).await?;
        self.apply_creations(cancel, create).await?;

        info!("successfully applied DNS changes");
        Ok(())
    }

    async fn apply_deletions(&self, cancel: &CancellationToken, endpoints: Vec<Endpoint>) -> Result<()> {
        if endpoints.is_empty() {
            return Ok(());
        }

        // One listing for the whole phase instead of one per endpoint
        let index = self
            .snapshot(cancel)
            .await
            .map_err(|e| e.context("failed to list DNS records for deletion"))?;

        self.parallel_delete(cancel, endpoints, index, Operation::Delete).await
    }

    async fn apply_updates(
        &self,
        cancel: &CancellationToken,
        old_endpoints: Vec<Endpoint>,
        new_endpoints: Vec<Endpoint>,
    ) -> Result<()> {
        if !old_endpoints.is_empty() {
            // Fresh snapshot: the delete phase may have changed remote state
            let index = self
                .snapshot(cancel)
                .await
                .map_err(|e| e.context("failed to list DNS records for update"))?;

            self.parallel_delete(cancel, old_endpoints, index, Operation::Update)
                .await?;
        }

        if !new_endpoints.is_empty() {
            self.parallel_create(cancel, new_endpoints, Operation::Update)
                .await?;
        }

        Ok(())
    }

    async fn apply_creations(&self, cancel: &CancellationToken, endpoints: Vec<Endpoint>) -> Result<()> {
        if endpoints.is_empty() {
            return Ok(());
        }

        self.parallel_create(cancel, endpoints, Operation::Create).await
    }

    /// List the site's records, giving up when `cancel` fires
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<RemoteRecord>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled("listing DNS records")),
            records = self.api.list_records(&self.site) => records,
        }
    }

    async fn snapshot(&self, cancel: &CancellationToken) -> Result<Arc<RecordIndex>> {
        let records = self.list(cancel).await?;
        Ok(Arc::new(RecordIndex::build(records)))
    }

    /// Delete every remote record under each endpoint's name, bounded by the limiter
    async fn parallel_delete(
        &self,
        cancel: &CancellationToken,
        endpoints: Vec<Endpoint>,
        index: Arc<RecordIndex>,
        operation: Operation,
    ) -> Result<()> {
        let mut workers = JoinSet::new();
        let mut seen = HashSet::with_capacity(endpoints.len());

        for endpoint in endpoints {
            // One worker already removes every record under this name
            if !seen.insert(endpoint.name.clone()) {
                debug!(name = %endpoint.name, r#type = %endpoint.record_type, "name already scheduled for deletion");
                continue;
            }

            let worker = self.worker(cancel);
            let index = Arc::clone(&index);

            workers.spawn(async move {
                let label = format!("delete {}", endpoint.name);
                let unit = delete_endpoint(worker.api.as_ref(), &worker.site, &endpoint, &index);

                worker
                    .run(operation, &label, unit)
                    .await
                    .map_err(|e| e.context(format!("failed to delete record {}", endpoint.name)))
            });
        }

        collect(workers, ErrorAggregator::new("parallel deletions")).await
    }

    /// Create one remote record per target of each endpoint, bounded by the limiter
    async fn parallel_create(
        &self,
        cancel: &CancellationToken,
        endpoints: Vec<Endpoint>,
        operation: Operation,
    ) -> Result<()> {
        let mut aggregator = ErrorAggregator::new("parallel creations");
        let mut workers = JoinSet::new();

        for endpoint in endpoints {
            if endpoint.targets.is_empty() {
                self.metrics.record_operation(operation, false, Duration::ZERO);
                aggregator.push(
                    Error::invalid_input(format!("endpoint has no targets: {}", endpoint.name))
                        .context(format!("failed to create record {}", endpoint.name)),
                );
                continue;
            }

            let worker = self.worker(cancel);

            workers.spawn(async move {
                let label = format!("create {}", endpoint.name);
                let unit = create_endpoint(worker.api.as_ref(), &worker.site, &endpoint);

                worker
                    .run(operation, &label, unit)
                    .await
                    .map_err(|e| e.context(format!("failed to create record {}", endpoint.name)))
            });
        }

        collect(workers, aggregator).await
    }

    fn worker(&self, cancel: &CancellationToken) -> Worker {
        Worker {
            api: Arc::clone(&self.api),
            site: Arc::clone(&self.site),
            limiter: self.limiter.clone(),
            metrics: Arc::clone(&self.metrics),
            cancel: cancel.clone(),
        }
    }
}

#[async_trait]
impl DnsProvider for ReconciliationEngine {
    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>> {
        ReconciliationEngine::records(self, cancel).await
    }

    async fn apply_changes(&self, cancel: &CancellationToken, changes: ChangeSet) -> Result<()> {
        ReconciliationEngine::apply_changes(self, cancel, changes).await
    }

    fn domain_filter(&self) -> &DomainFilter {
        &self.domain_filter
    }
}

/// Everything one spawned unit needs, owned so the task is `'static`
struct Worker {
    api: Arc<dyn RecordApi>,
    site: Arc<str>,
    limiter: ConcurrencyLimiter,
    metrics: Arc<dyn MetricsRecorder>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run<F>(&self, operation: Operation, label: &str, unit: F) -> Result<()>
    where
        F: std::future::Future<Output = Result<()>>,
    {
        // Timed from slot acquisition, not from queueing
        let started = OnceLock::new();
        let timed = async {
            started.get_or_init(Instant::now);
            unit.await
        };

        let outcome = self.limiter.run(&self.cancel, label, timed).await;
        let elapsed = started.get().map(Instant::elapsed).unwrap_or_default();
        self.metrics.record_operation(operation, outcome.is_ok(), elapsed);
        outcome
    }
}

/// Join every worker of a phase, then report all failures at once
async fn collect(mut workers: JoinSet<Result<()>>, mut aggregator: ErrorAggregator) -> Result<()> {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(outcome) => aggregator.record(outcome),
            Err(join_error) => aggregator.push(Error::Other(format!("worker task failed: {join_error}"))),
        }
    }

    aggregator.finish()
}

async fn delete_endpoint(
    api: &dyn RecordApi,
    site: &str,
    endpoint: &Endpoint,
    index: &RecordIndex,
) -> Result<()> {
    let records = index.get(&endpoint.name);

    if records.is_empty() {
        warn!(name = %endpoint.name, "record not found for deletion");
        return Ok(());
    }

    for record in records {
        info!(
            name = %endpoint.name,
            r#type = %endpoint.record_type,
            id = %record.id,
            "deleting DNS record"
        );

        match api.delete_record(site, &record.id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(name = %endpoint.name, id = %record.id, "record already deleted");
            }
            Err(e) => return Err(e.context("failed to delete DNS record")),
        }
    }

    Ok(())
}

async fn create_endpoint(api: &dyn RecordApi, site: &str, endpoint: &Endpoint) -> Result<()> {
    if !endpoint.record_type.is_supported() {
        warn!(
            name = %endpoint.name,
            r#type = %endpoint.record_type,
            "skipping unsupported record type"
        );
        return Ok(());
    }

    for input in convert::to_remote_inputs(endpoint) {
        info!(
            name = %endpoint.name,
            r#type = %endpoint.record_type,
            target = %input.value,
            "creating DNS record"
        );
        debug!(record_input = ?input, "DNS record input");

        api.create_record(site, &input)
            .await
            .map_err(|e| e.context(format!("failed to create DNS record for target {}", input.value)))?;
    }

    Ok(())
}
