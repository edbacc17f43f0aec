use crate::repository::UrlRecord;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

/// Parameters for creating a shortened URL.
#[derive(Debug, Clone, Default)]
pub struct ShortenParams {
    /// The raw long URL as supplied by the caller.
    pub long_url: String,
    /// Optional custom code. `None` and an empty string both request a generated code.
    pub custom_code: Option<String>,
}

impl ShortenParams {
    pub fn generated(long_url: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            custom_code: None,
        }
    }

    pub fn custom(long_url: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            long_url: long_url.into(),
            custom_code: Some(code.into()),
        }
    }

    /// The custom code, if one was actually requested.
    ///
    /// An empty code asks for generation; anything else is taken verbatim.
    pub fn requested_code(&self) -> Option<&str> {
        self.custom_code.as_deref().filter(|code| !code.is_empty())
    }
}

/// The operations the request-handling layer consumes.
#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Creates (or reuses) a short code for a long URL.
    async fn create(&self, params: ShortenParams) -> Result<ShortCode>;

    /// Resolves a code case-insensitively, counting one click.
    async fn resolve(&self, code: &str) -> Result<String>;

    /// Points an existing code at a new long URL.
    async fn update(&self, code: &str, new_long_url: &str) -> Result<()>;

    /// Deletes the record behind a code.
    async fn delete(&self, code: &str) -> Result<()>;

    /// Every live record.
    async fn list_all(&self) -> Result<Vec<UrlRecord>>;

    /// Repopulates the acceleration index from the store, returning the number of entries.
    async fn rebuild_index(&self) -> Result<usize>;
}
