//! Cached readiness probe
//!
//! Readiness means "a full record listing through the provider succeeds".
//! Probes are expensive, so the outcome is cached for a TTL and concurrent
//! callers arriving while the cache is stale share a single probe.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::traits::{DnsProvider, MetricsRecorder, NoopRecorder};

/// How long a probe result is served from cache by default
pub const DEFAULT_READINESS_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct Probe {
    is_ready: bool,
    /// `None` until the first probe completes
    checked_at: Option<Instant>,
}

/// TTL cache in front of a provider's record listing
pub struct ReadinessCache {
    provider: Arc<dyn DnsProvider>,
    ttl: Duration,
    state: RwLock<Probe>,
    /// Held for the duration of a real probe
    probe_gate: Mutex<()>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl ReadinessCache {
    /// Create a cache that has not probed yet
    pub fn new(provider: Arc<dyn DnsProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            state: RwLock::new(Probe::default()),
            probe_gate: Mutex::new(()),
            metrics: Arc::new(NoopRecorder),
        }
    }

    /// Replace the metrics sink
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Whether the provider can currently list records
    ///
    /// Serves the cached outcome while it is younger than the TTL. Otherwise
    /// one caller probes and every concurrent caller waits for, then reuses,
    /// that probe's outcome. A failed probe is cached like a successful one.
    pub async fn check(&self, cancel: &CancellationToken) -> bool {
        if let Some((is_ready, age)) = self.cached().await {
            self.metrics.readiness_cache_hit(age);
            return is_ready;
        }

        // Every caller that finds the cache stale is a miss, probing or not
        self.metrics.readiness_cache_miss();

        let _gate = self.probe_gate.lock().await;

        // Another caller may have probed while we queued on the gate
        if let Some((is_ready, _)) = self.cached().await {
            return is_ready;
        }

        debug!("readiness cache stale, probing provider");

        let is_ready = match self.provider.records(cancel).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "readiness check failed");
                false
            }
        };

        let mut state = self.state.write().await;
        state.is_ready = is_ready;
        state.checked_at = Some(Instant::now());

        is_ready
    }

    /// Cached outcome and its age, if younger than the TTL
    async fn cached(&self) -> Option<(bool, Duration)> {
        let state = self.state.read().await;
        let age = state.checked_at?.elapsed();

        (age < self.ttl).then_some((state.is_ready, age))
    }
}
