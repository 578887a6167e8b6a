//! Name index over one remote listing
//!
//! Built once per delete pass so each endpoint resolves its remote records
//! in O(1) instead of scanning the listing. An index is a single
//! point-in-time snapshot: it is never updated and never merged with a
//! second listing.

use std::collections::HashMap;

use crate::traits::RemoteRecord;

/// Remote records grouped by name
#[derive(Debug, Clone, Default)]
pub struct RecordIndex {
    by_name: HashMap<String, Vec<RemoteRecord>>,
}

impl RecordIndex {
    /// Group a listing by record name
    ///
    /// Records sharing a name keep their relative order from `records`.
    pub fn build(records: Vec<RemoteRecord>) -> Self {
        let mut by_name: HashMap<String, Vec<RemoteRecord>> = HashMap::with_capacity(records.len());

        for record in records {
            by_name
                .entry(record.name.clone())
                // Typical case is one or two targets per name
                .or_insert_with(|| Vec::with_capacity(2))
                .push(record);
        }

        Self { by_name }
    }

    /// Every remote record named `name`; empty when there are none
    pub fn get(&self, name: &str) -> &[RemoteRecord] {
        self.by_name.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}
