//! Bounded concurrency for remote mutations
//!
//! Every unit of remote work (one endpoint's creations or deletions) runs
//! through [`ConcurrencyLimiter::run`]: take a slot, run under the
//! per-operation deadline, give the slot back, report.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Default number of concurrent remote mutations
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Default deadline for a single unit of remote work
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed-capacity slot pool plus a per-unit deadline
///
/// Cloning shares the slot pool, so clones moved into worker tasks all
/// count against the same bound.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
    timeout: Duration,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots (at least one)
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            timeout,
        }
    }

    /// Configured slot count
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured per-unit deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run one unit of work under the limiter
    ///
    /// Waiting for a slot is abandoned when `cancel` fires; that is reported
    /// as [`Error::Limiter`], not attributed to the unit. Once running, the
    /// unit races both its own deadline and `cancel`. The slot is released
    /// before the outcome is returned, whatever the outcome.
    pub async fn run<T, F>(&self, cancel: &CancellationToken, label: &str, unit: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(Error::limiter(format!(
                    "cancelled while waiting for a slot: {label}"
                )));
            }
            permit = self.slots.acquire() => permit
                .map_err(|_| Error::limiter("slot pool closed"))?,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::cancelled(label.to_string())),
            result = tokio::time::timeout(self.timeout, unit) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout {
                    operation: label.to_string(),
                    after: self.timeout,
                }),
            },
        };

        drop(permit);
        outcome
    }
}

impl Default for ConcurrencyLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY, DEFAULT_OPERATION_TIMEOUT)
    }
}
