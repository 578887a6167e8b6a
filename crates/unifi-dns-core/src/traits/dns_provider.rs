// # DNS Provider Trait
//
// Defines the interface the webhook protocol layer and the readiness cache
// talk to. `ReconciliationEngine` is the production implementation.
//
// ## Usage
//
// ```rust,ignore
// use tokio_util::sync::CancellationToken;
// use unifi_dns_core::DnsProvider;
//
// let token = CancellationToken::new();
// let endpoints = provider.records(&token).await?;
// provider.apply_changes(&token, changes).await?;
// ```

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::endpoint::{ChangeSet, Endpoint};
use crate::filter::DomainFilter;

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks; the
/// webhook server calls them from concurrent request handlers.
///
/// # Cancellation
///
/// `cancel` is the caller's cancellation signal. Implementations stop
/// waiting on the remote controller once it fires and report
/// [`crate::Error::Cancelled`].
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Retrieve every managed record that passes the domain filter
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Endpoint>)`: endpoints in the remote listing's order
    /// - `Err(Error)`: the listing failed; no partial result is returned
    async fn records(&self, cancel: &CancellationToken) -> Result<Vec<Endpoint>, crate::Error>;

    /// Apply a batch of changes, converging remote state
    ///
    /// # Returns
    ///
    /// - `Ok(())`: every item of every phase succeeded
    /// - `Err(Error)`: the first phase that had failures, with all of them
    async fn apply_changes(
        &self,
        cancel: &CancellationToken,
        changes: ChangeSet,
    ) -> Result<(), crate::Error>;

    /// Rewrite endpoints before external-dns stores them
    ///
    /// The default is the identity transform.
    fn adjust_endpoints(&self, endpoints: Vec<Endpoint>) -> Result<Vec<Endpoint>, crate::Error> {
        Ok(endpoints)
    }

    /// Domain filter this provider applies, for protocol negotiation
    fn domain_filter(&self) -> &DomainFilter;
}
