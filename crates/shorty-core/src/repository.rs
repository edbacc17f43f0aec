use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// How a record's short code came to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeKind {
    /// Produced by a code generator; eligible for the acceleration index.
    #[default]
    Generated,
    /// Supplied by the caller; never indexed.
    Custom,
}

/// A stored short-code mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The unique code, primary key of the repository.
    pub short_code: ShortCode,
    /// The canonical long URL.
    pub long_url: String,
    /// Number of successful resolutions.
    #[serde(default)]
    pub click_count: u64,
    #[serde(default)]
    pub kind: CodeKind,
}

impl UrlRecord {
    /// A fresh record with a zero click count.
    pub fn new(short_code: ShortCode, long_url: impl Into<String>, kind: CodeKind) -> Self {
        Self {
            short_code,
            long_url: long_url.into(),
            click_count: 0,
            kind,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.kind == CodeKind::Generated
    }
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record stored under exactly this code.
    /// Returns `None` if the code does not exist.
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>>;

    /// Returns every live record, in no particular order.
    async fn list_all(&self) -> Result<Vec<UrlRecord>>;

    /// Retrieves the record whose code matches `code` ignoring ASCII case.
    ///
    /// An exact-key hit wins over case-insensitive matches. The default
    /// falls back to a full scan; backends with a folded index should
    /// override it.
    async fn get_ignore_case(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        if let Some(record) = self.get(code).await? {
            return Ok(Some(record));
        }

        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|record| record.short_code.matches(code.as_str())))
    }

    /// Finds a generated record by its canonical long URL.
    ///
    /// Custom records are never returned. The default falls back to a full
    /// scan; backends with a URL index should override it.
    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<UrlRecord>> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|record| record.is_generated() && record.long_url == long_url))
    }

    /// Checks whether a record exists under exactly this code.
    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.get(code).await?.is_some())
    }
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts the record, overwriting any record stored under the same code.
    async fn put(&self, record: UrlRecord) -> Result<()>;

    /// Deletes the record stored under exactly this code.
    /// Returns `true` if the record existed and was removed.
    async fn delete(&self, code: &ShortCode) -> Result<bool>;
}
