//! In-memory [`DnsProvider`] for router tests

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use unifi_dns_core::{ChangeSet, DnsProvider, DomainFilter, Endpoint, Error};

#[derive(Default)]
pub struct FakeProvider {
    filter: DomainFilter,
    records: Mutex<Vec<Endpoint>>,
    applied: Mutex<Vec<ChangeSet>>,
    failure: Mutex<Option<String>>,
    listings: AtomicUsize,
    panics: AtomicBool,
}

impl FakeProvider {
    pub fn with_filters(filters: &[&str]) -> Self {
        Self {
            filter: DomainFilter::new(filters.iter().copied(), Vec::<String>::new()),
            ..Self::default()
        }
    }

    pub fn set_records(&self, records: Vec<Endpoint>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Make every listing panic, as a bug in the provider would
    pub fn panic_on_listing(&self) {
        self.panics.store(true, Ordering::SeqCst);
    }

    pub fn applied(&self) -> Vec<ChangeSet> {
        self.applied.lock().unwrap().clone()
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    fn failure(&self) -> Option<Error> {
        self.failure
            .lock()
            .unwrap()
            .as_ref()
            .map(|message| Error::api("unifi", message.clone()))
    }
}

#[async_trait]
impl DnsProvider for FakeProvider {
    async fn records(&self, _cancel: &CancellationToken) -> Result<Vec<Endpoint>, Error> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.panics.load(Ordering::SeqCst) {
            panic!("listing blew up");
        }
        match self.failure() {
            Some(e) => Err(e),
            None => Ok(self.records.lock().unwrap().clone()),
        }
    }

    async fn apply_changes(
        &self,
        _cancel: &CancellationToken,
        changes: ChangeSet,
    ) -> Result<(), Error> {
        if let Some(e) = self.failure() {
            return Err(e);
        }
        self.applied.lock().unwrap().push(changes);
        Ok(())
    }

    fn domain_filter(&self) -> &DomainFilter {
        &self.filter
    }
}
