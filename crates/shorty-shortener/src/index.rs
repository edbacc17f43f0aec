use dashmap::DashMap;
use shorty_core::{ShortCode, UrlRecord};
use tracing::debug;

/// Derived mapping from canonical long URL to its generated short code.
///
/// The index is a cache, never the source of truth: it can be rebuilt from
/// the store at any time and it never holds custom codes.
#[derive(Debug, Default)]
pub struct AccelerationIndex {
    entries: DashMap<String, ShortCode>,
}

impl AccelerationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generated code registered for a canonical URL.
    pub fn get(&self, canonical: &str) -> Option<ShortCode> {
        self.entries.get(canonical).map(|entry| entry.clone())
    }

    /// Registers `code` for `canonical`, replacing any previous entry.
    pub fn insert(&self, canonical: impl Into<String>, code: ShortCode) {
        self.entries.insert(canonical.into(), code);
    }

    /// Registers `code` unless `canonical` already has an entry.
    ///
    /// Returns the code that is registered afterwards.
    pub fn insert_if_absent(&self, canonical: impl Into<String>, code: ShortCode) -> ShortCode {
        self.entries.entry(canonical.into()).or_insert(code).clone()
    }

    /// Removes the entry for `canonical` if it still points at `code`.
    pub fn evict(&self, canonical: &str, code: &ShortCode) -> bool {
        self.entries
            .remove_if(canonical, |_, registered| registered.matches(code.as_str()))
            .is_some()
    }

    /// Replaces the whole content with the generated records among `records`.
    ///
    /// When several generated records share a canonical URL the first one
    /// seen wins. Returns the number of entries afterwards.
    pub fn rebuild(&self, records: impl IntoIterator<Item = UrlRecord>) -> usize {
        self.entries.clear();
        for record in records.into_iter().filter(UrlRecord::is_generated) {
            self.insert_if_absent(record.long_url, record.short_code);
        }
        let len = self.entries.len();
        debug!(entries = len, "rebuilt acceleration index");
        len
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
