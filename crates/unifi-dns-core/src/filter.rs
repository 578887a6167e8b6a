//! Domain filtering for managed record names
//!
//! Mirrors external-dns' include/exclude domain filter: an empty include
//! list manages everything, a name matches an entry when it is the entry
//! itself or one of its subdomains, and a leading dot restricts an entry to
//! strict subdomains.

use serde::{Deserialize, Serialize};

/// Include/exclude filter over record names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
    filters: Vec<String>,
    exclude_filters: Vec<String>,
}

impl DomainFilter {
    /// Create a filter from include and exclude entries
    ///
    /// Entries are trimmed, lower-cased and stripped of trailing dots;
    /// empty entries are dropped.
    pub fn new(
        filters: impl IntoIterator<Item = impl AsRef<str>>,
        exclude_filters: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        Self {
            filters: normalize_all(filters),
            exclude_filters: normalize_all(exclude_filters),
        }
    }

    /// Include entries, as advertised during protocol negotiation
    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    /// Whether `name` is managed under this filter
    pub fn matches(&self, name: &str) -> bool {
        let name = normalize(name);

        if self
            .exclude_filters
            .iter()
            .any(|entry| entry_matches(entry, &name))
        {
            return false;
        }

        self.filters.is_empty() || self.filters.iter().any(|entry| entry_matches(entry, &name))
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn normalize_all(entries: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    entries
        .into_iter()
        .map(|entry| normalize(entry.as_ref()))
        .filter(|entry| !entry.is_empty() && entry != ".")
        .collect()
}

fn entry_matches(entry: &str, name: &str) -> bool {
    if entry.starts_with('.') {
        // ".example.com" only covers subdomains
        return name.ends_with(entry);
    }

    name == entry
        || name
            .strip_suffix(entry)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
