//! Error types for the UniFi DNS webhook
//!
//! This module defines all error types used throughout the workspace.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the UniFi DNS webhook
#[derive(Error, Debug)]
pub enum Error {
    /// Remote record API returned a failure (server side or unexpected status)
    #[error("Record API error ({api}): {message}")]
    Api {
        /// Name of the remote API (e.g. "unifi")
        api: String,
        /// Error message
        message: String,
    },

    /// Transport-level HTTP failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A concurrency slot could not be acquired
    #[error("Limiter error: {0}")]
    Limiter(String),

    /// A single remote operation ran past its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// What was running
        operation: String,
        /// The deadline that elapsed
        after: Duration,
    },

    /// The parent cancellation signal fired
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Every failure of one apply phase
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    /// An underlying error annotated with what was being attempted
    #[error("{context}: {source}")]
    Context {
        /// What was being attempted
        context: String,
        /// The underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a remote API error
    pub fn api(api: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            api: api.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a limiter error
    pub fn limiter(msg: impl Into<String>) -> Self {
        Self::Limiter(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Wrap this error with a description of what was being attempted
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Strip all `Context` wrappers and return the underlying error
    pub fn root(&self) -> &Error {
        let mut current = self;
        while let Error::Context { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether the underlying cause is cancellation of the parent signal
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Error::Cancelled(_))
    }

    /// Whether the underlying cause is the remote reporting a missing record
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Error::NotFound(_))
    }

    /// Whether the underlying cause is a per-operation timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Error::Timeout { .. })
    }
}

/// Composite failure of one apply phase.
///
/// Errors are kept in the order they were handed over, which for a
/// concurrent phase is completion order. Identical failures are not
/// collapsed: `len()` is always the number of failed items.
#[derive(Debug)]
pub struct AggregateError {
    operation: String,
    errors: Vec<Error>,
}

impl AggregateError {
    /// The phase this aggregate describes (e.g. "parallel deletions")
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Every collected failure
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Number of failed items
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always false for an aggregate produced by [`ErrorAggregator`]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed: {} errors occurred: [",
            self.operation,
            self.errors.len()
        )?;
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}

impl std::error::Error for AggregateError {}

/// Collects per-item failures of one phase into a single error.
#[derive(Debug)]
pub struct ErrorAggregator {
    operation: String,
    errors: Vec<Error>,
}

impl ErrorAggregator {
    /// Start collecting for the named phase
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            errors: Vec::new(),
        }
    }

    /// Record one failed item
    pub fn push(&mut self, err: Error) {
        self.errors.push(err);
    }

    /// Record the outcome of one item, keeping only failures
    pub fn record<T>(&mut self, outcome: Result<T>) {
        if let Err(err) = outcome {
            self.push(err);
        }
    }

    /// Number of failures collected so far
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no failure has been collected
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing failed, otherwise the composite error
    pub fn finish(self) -> Result<()> {
        if self.errors.is_empty() {
            return Ok(());
        }

        Err(Error::Aggregate(AggregateError {
            operation: self.operation,
            errors: self.errors,
        }))
    }
}
