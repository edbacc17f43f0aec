use async_trait::async_trait;
use dashmap::DashMap;
use shorty_core::repository::{ReadRepository, Repository, Result, UrlRecord};
use shorty_core::ShortCode;

/// In-memory repository backed by a `DashMap`.
///
/// Keys are the exact (case-sensitive) codes; case-insensitive lookups
/// walk the shards. Contents are lost when the process exits.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    storage: DashMap<String, UrlRecord>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        Ok(self.storage.get(code.as_str()).map(|entry| entry.clone()))
    }

    async fn list_all(&self) -> Result<Vec<UrlRecord>> {
        Ok(self
            .storage
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_ignore_case(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        if let Some(entry) = self.storage.get(code.as_str()) {
            return Ok(Some(entry.clone()));
        }

        Ok(self
            .storage
            .iter()
            .find(|entry| code.matches(entry.key()))
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<UrlRecord>> {
        Ok(self
            .storage
            .iter()
            .find(|entry| entry.is_generated() && entry.long_url == long_url)
            .map(|entry| entry.value().clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.contains_key(code.as_str()))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn put(&self, record: UrlRecord) -> Result<()> {
        let key = record.short_code.as_str().to_owned();
        self.storage.insert(key, record);
        Ok(())
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.remove(code.as_str()).is_some())
    }
}
