// # Metrics Recorder Trait
//
// Observability capability injected into the engine and the readiness
// cache at construction. Every method defaults to a no-op so minimal
// deployments and tests can pass `NoopRecorder`.

use std::fmt;
use std::time::Duration;

/// Kind of remote mutation, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create phase
    Create,
    /// Update phase (delete-then-create)
    Update,
    /// Delete phase
    Delete,
}

impl Operation {
    /// Label value
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for the engine's and readiness cache's metrics
pub trait MetricsRecorder: Send + Sync {
    /// One unit of remote work finished
    fn record_operation(&self, _operation: Operation, _success: bool, _duration: Duration) {}

    /// Number of managed records of one type seen by the last listing
    fn set_records_managed(&self, _record_type: &str, _count: usize) {}

    /// Size of one phase of an incoming change set
    fn observe_changes(&self, _operation: Operation, _count: usize) {}

    /// Readiness served from cache
    fn readiness_cache_hit(&self, _age: Duration) {}

    /// Readiness required a real probe
    fn readiness_cache_miss(&self) {}
}

/// Recorder that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}
