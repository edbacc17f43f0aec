use crate::index::AccelerationIndex;
use crate::lock::KeyedLock;
use crate::normalize::{is_valid, normalize};
use crate::settings::ShortenerSettings;
use async_trait::async_trait;
use shorty_core::{
    CodeKind, Repository, ShortCode, ShortenParams, Shortener, ShortenerError, UrlRecord,
};
use shorty_generator::Generator;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

type Result<T> = std::result::Result<T, ShortenerError>;

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `Generator` and owns the
/// acceleration index. Read-check-write sequences are serialized per key:
/// per canonical URL for generated codes, per folded code for everything
/// touching a record. A URL lock is always taken before a code lock.
#[derive(Debug)]
pub struct ShortenerService<R, G> {
    repository: Arc<R>,
    generator: Arc<G>,
    index: Arc<AccelerationIndex>,
    url_locks: Arc<KeyedLock>,
    code_locks: Arc<KeyedLock>,
    settings: ShortenerSettings,
}

impl<R, G> Clone for ShortenerService<R, G> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            generator: Arc::clone(&self.generator),
            index: Arc::clone(&self.index),
            url_locks: Arc::clone(&self.url_locks),
            code_locks: Arc::clone(&self.code_locks),
            settings: self.settings,
        }
    }
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G) -> Self {
        Self::with_settings(repository, generator, ShortenerSettings::default())
    }

    pub fn with_settings(repository: R, generator: G, settings: ShortenerSettings) -> Self {
        Self::with_index(
            Arc::new(repository),
            Arc::new(generator),
            Arc::new(AccelerationIndex::new()),
            settings,
        )
    }

    /// Builds a service over shared parts, e.g. a repository the caller keeps
    /// a handle to.
    pub fn with_index(
        repository: Arc<R>,
        generator: Arc<G>,
        index: Arc<AccelerationIndex>,
        settings: ShortenerSettings,
    ) -> Self {
        Self {
            repository,
            generator,
            index,
            url_locks: Arc::new(KeyedLock::new()),
            code_locks: Arc::new(KeyedLock::new()),
            settings,
        }
    }

    pub fn index(&self) -> &AccelerationIndex {
        &self.index
    }

    pub fn settings(&self) -> &ShortenerSettings {
        &self.settings
    }

    fn ensure_valid(canonical: &str) -> Result<()> {
        if is_valid(canonical) {
            Ok(())
        } else {
            Err(ShortenerError::InvalidUrlFormat(canonical.to_string()))
        }
    }

    fn canonicalize(raw: &str) -> Result<String> {
        if raw.trim().is_empty() {
            return Err(ShortenerError::InvalidUrlFormat(
                "long url cannot be empty".to_string(),
            ));
        }
        Ok(normalize(raw))
    }

    async fn create_custom(&self, code: ShortCode, canonical: String) -> Result<ShortCode> {
        let _code_guard = self.code_locks.lock(code.folded()).await;

        if let Some(existing) = self.repository.get_ignore_case(&code).await? {
            debug!(code = %code, existing = %existing.short_code, "custom code already taken");
            return Err(ShortenerError::CodeAlreadyExists(code.to_string()));
        }
        Self::ensure_valid(&canonical)?;

        self.repository
            .put(UrlRecord::new(code.clone(), canonical, CodeKind::Custom))
            .await?;
        info!(code = %code, "created custom short code");
        Ok(code)
    }

    async fn create_generated(&self, canonical: String) -> Result<ShortCode> {
        Self::ensure_valid(&canonical)?;
        let _url_guard = self.url_locks.lock(canonical.as_str()).await;

        if let Some(code) = self.reuse_indexed(&canonical).await? {
            return Ok(code);
        }

        if self.settings.reuse_from_store {
            if let Some(record) = self.repository.find_by_long_url(&canonical).await? {
                debug!(code = %record.short_code, url = %canonical, "reusing stored code");
                self.index
                    .insert(canonical.as_str(), record.short_code.clone());
                return Ok(record.short_code);
            }
        }

        let code = self.allocate(&canonical).await?;
        self.index.insert(canonical, code.clone());
        Ok(code)
    }

    /// Checks the index entry for `canonical` against the store.
    ///
    /// Must be called with the URL lock for `canonical` held.
    async fn reuse_indexed(&self, canonical: &str) -> Result<Option<ShortCode>> {
        let Some(code) = self.index.get(canonical) else {
            return Ok(None);
        };
        let _code_guard = self.code_locks.lock(code.folded()).await;

        match self.repository.get_ignore_case(&code).await? {
            Some(record) if record.short_code == code && record.long_url == canonical => {
                trace!(code = %code, "index hit");
                Ok(Some(code))
            }
            Some(record) => {
                warn!(
                    code = %code,
                    stored_url = %record.long_url,
                    url = %canonical,
                    "evicting stale index entry"
                );
                self.index.evict(canonical, &code);
                Ok(None)
            }
            None => {
                debug!(code = %code, "indexed code missing from store, persisting it");
                self.repository
                    .put(UrlRecord::new(code.clone(), canonical, CodeKind::Generated))
                    .await?;
                Ok(Some(code))
            }
        }
    }

    /// Draws candidates until one is free in the store, then persists it.
    async fn allocate(&self, canonical: &str) -> Result<ShortCode> {
        let budget = self.settings.max_generation_attempts;

        for attempt in 1..=budget {
            let candidate = self.generator.generate();
            let _code_guard = self.code_locks.lock(candidate.folded()).await;

            if self.repository.get_ignore_case(&candidate).await?.is_some() {
                trace!(code = %candidate, attempt, "generated code collides");
                continue;
            }

            self.repository
                .put(UrlRecord::new(
                    candidate.clone(),
                    canonical,
                    CodeKind::Generated,
                ))
                .await?;
            info!(code = %candidate, attempt, "created generated short code");
            return Ok(candidate);
        }

        warn!(attempts = budget, url = %canonical, "short code space exhausted");
        Err(ShortenerError::GenerationExhausted { attempts: budget })
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn create(&self, params: ShortenParams) -> Result<ShortCode> {
        let canonical = Self::canonicalize(&params.long_url)?;

        match params.requested_code() {
            Some(code) => self.create_custom(ShortCode::new(code), canonical).await,
            None => self.create_generated(canonical).await,
        }
    }

    async fn resolve(&self, code: &str) -> Result<String> {
        let lookup = ShortCode::new(code);
        let _code_guard = self.code_locks.lock(lookup.folded()).await;

        let Some(mut record) = self.repository.get_ignore_case(&lookup).await? else {
            debug!(code = %code, "short code not found");
            return Err(ShortenerError::CodeNotFound(code.to_string()));
        };

        record.click_count = record.click_count.saturating_add(1);
        let long_url = record.long_url.clone();
        trace!(code = %record.short_code, clicks = record.click_count, "resolved");
        self.repository.put(record).await?;

        Ok(long_url)
    }

    async fn update(&self, code: &str, new_long_url: &str) -> Result<()> {
        let canonical = Self::canonicalize(new_long_url)?;
        Self::ensure_valid(&canonical)?;

        let lookup = ShortCode::new(code);
        let _url_guard = self.url_locks.lock(canonical.as_str()).await;
        let _code_guard = self.code_locks.lock(lookup.folded()).await;

        let targets: Vec<UrlRecord> = self
            .repository
            .list_all()
            .await?
            .into_iter()
            .filter(|record| record.short_code.matches(code))
            .collect();
        if targets.is_empty() {
            return Err(ShortenerError::CodeNotFound(code.to_string()));
        }

        for mut record in targets {
            let previous = std::mem::replace(&mut record.long_url, canonical.clone());
            let short_code = record.short_code.clone();
            let generated = record.is_generated();
            self.repository.put(record).await?;

            if generated {
                self.index.evict(&previous, &short_code);
                self.index.insert_if_absent(canonical.as_str(), short_code.clone());
            }
            info!(code = %short_code, from = %previous, to = %canonical, "updated long url");
        }

        Ok(())
    }

    async fn delete(&self, code: &str) -> Result<()> {
        let lookup = ShortCode::new(code);
        let _code_guard = self.code_locks.lock(lookup.folded()).await;

        // Exact key first, then the first case-insensitive match.
        let Some(record) = self.repository.get_ignore_case(&lookup).await? else {
            return Err(ShortenerError::CodeNotFound(code.to_string()));
        };
        if !self.repository.delete(&record.short_code).await? {
            return Err(ShortenerError::CodeNotFound(code.to_string()));
        }

        if record.is_generated() {
            self.index.evict(&record.long_url, &record.short_code);
        }
        info!(code = %record.short_code, "deleted short code");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<UrlRecord>> {
        Ok(self.repository.list_all().await?)
    }

    async fn rebuild_index(&self) -> Result<usize> {
        let records = self.repository.list_all().await?;
        let entries = self.index.rebuild(records);
        info!(entries, "acceleration index rebuilt from store");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shorty_core::ReadRepository;
    use shorty_generator::SeqGenerator;
    use shorty_storage::InMemoryRepository;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed list of codes, then repeats the last one.
    #[derive(Debug)]
    struct ScriptedGenerator {
        codes: Mutex<VecDeque<&'static str>>,
    }

    impl ScriptedGenerator {
        fn new(codes: &[&'static str]) -> Self {
            Self {
                codes: Mutex::new(codes.iter().copied().collect()),
            }
        }
    }

    impl Generator for ScriptedGenerator {
        fn generate(&self) -> ShortCode {
            let mut codes = self.codes.lock().unwrap();
            let code = if codes.len() > 1 {
                codes.pop_front().unwrap()
            } else {
                codes[0]
            };
            ShortCode::new(code)
        }
    }

    fn test_service() -> ShortenerService<InMemoryRepository, SeqGenerator> {
        let repo = InMemoryRepository::new();
        let generator = SeqGenerator::with_prefix("wh");
        ShortenerService::new(repo, generator)
    }

    fn shared_service<G: Generator>(
        generator: G,
        settings: ShortenerSettings,
    ) -> (Arc<InMemoryRepository>, ShortenerService<InMemoryRepository, G>) {
        let repo = Arc::new(InMemoryRepository::new());
        let service = ShortenerService::with_index(
            Arc::clone(&repo),
            Arc::new(generator),
            Arc::new(AccelerationIndex::new()),
            settings,
        );
        (repo, service)
    }

    #[tokio::test]
    async fn create_with_generated_code() {
        let service = test_service();

        let code = service
            .create(ShortenParams::generated("https://www.Example.com/"))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "wh000000");

        let records = service.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].long_url, "http://example.com");
        assert_eq!(records[0].click_count, 0);
        assert_eq!(records[0].kind, CodeKind::Generated);
        assert_eq!(service.index().get("http://example.com"), Some(code));
    }

    #[tokio::test]
    async fn sequential_codes_never_exhaust_the_budget() {
        let service = test_service();

        let mut codes = std::collections::HashSet::new();
        for i in 0..3000 {
            let code = service
                .create(ShortenParams::generated(format!("https://example.com/{i}")))
                .await
                .unwrap_or_else(|e| panic!("create #{i} failed: {e}"));
            assert!(codes.insert(code.folded()));
        }
        assert_eq!(service.list_all().await.unwrap().len(), 3000);
    }

    #[tokio::test]
    async fn create_reuses_code_for_equivalent_url() {
        let service = test_service();

        let first = service
            .create(ShortenParams::generated("https://www.Example.com/"))
            .await
            .unwrap();
        let second = service
            .create(ShortenParams::generated("example.com"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(service.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_with_custom_code() {
        let service = test_service();

        let code = service
            .create(ShortenParams::custom("https://example.com", "my-alias"))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "my-alias");

        let records = service.list_all().await.unwrap();
        assert_eq!(records[0].kind, CodeKind::Custom);
        assert!(service.index().is_empty());
    }

    #[tokio::test]
    async fn empty_custom_code_is_generated() {
        let service = test_service();

        let code = service
            .create(ShortenParams::custom("https://example.com", ""))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "wh000000");
    }

    #[tokio::test]
    async fn custom_code_conflict_ignores_case() {
        let service = test_service();

        service
            .create(ShortenParams::custom("https://a.com", "abc123"))
            .await
            .unwrap();
        let err = service
            .create(ShortenParams::custom("https://b.com", "ABC123"))
            .await
            .unwrap_err();

        assert!(matches!(err, ShortenerError::CodeAlreadyExists(code) if code == "ABC123"));
        assert_eq!(service.resolve("abc123").await.unwrap(), "http://a.com");
    }

    #[tokio::test]
    async fn custom_codes_are_taken_verbatim() {
        let service = test_service();

        for (i, raw) in ["ab", "my.link", " pad ", "a b"].into_iter().enumerate() {
            let url = format!("https://a{i}.com");
            let code = service
                .create(ShortenParams::custom(url.as_str(), raw))
                .await
                .unwrap();
            assert_eq!(code.as_str(), raw);
            assert_eq!(service.resolve(raw).await.unwrap(), format!("http://a{i}.com"));
        }
        assert_eq!(service.list_all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn invalid_url_leaves_no_state() {
        let service = test_service();

        for raw in ["", "   ", "exa mple.com", "http://"] {
            let err = service
                .create(ShortenParams::generated(raw))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ShortenerError::InvalidUrlFormat(_)),
                "input {raw:?}"
            );
        }
        let err = service
            .create(ShortenParams::custom("exa mple.com", "mine"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrlFormat(_)));

        assert!(service.list_all().await.unwrap().is_empty());
        assert!(service.index().is_empty());
    }

    #[tokio::test]
    async fn generation_skips_taken_codes_ignoring_case() {
        let (repo, service) = shared_service(
            ScriptedGenerator::new(&["ABC123", "abc123", "xyz789"]),
            ShortenerSettings::default(),
        );
        repo.put(UrlRecord::new(
            ShortCode::new("abc123"),
            "http://taken.com",
            CodeKind::Custom,
        ))
        .await
        .unwrap();

        let code = service
            .create(ShortenParams::generated("https://new.com"))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "xyz789");
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn generation_gives_up_after_budget() {
        let (repo, service) = shared_service(
            ScriptedGenerator::new(&["taken1"]),
            ShortenerSettings::builder().max_generation_attempts(5).build(),
        );
        repo.put(UrlRecord::new(
            ShortCode::new("taken1"),
            "http://taken.com",
            CodeKind::Generated,
        ))
        .await
        .unwrap();

        let err = service
            .create(ShortenParams::generated("https://new.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::GenerationExhausted { attempts: 5 }));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn store_fallback_reuses_generated_record() {
        let (repo, service) =
            shared_service(SeqGenerator::with_prefix("wh"), ShortenerSettings::default());
        repo.put(UrlRecord::new(
            ShortCode::new("old001"),
            "http://a.com",
            CodeKind::Generated,
        ))
        .await
        .unwrap();

        let code = service
            .create(ShortenParams::generated("a.com"))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "old001");
        assert_eq!(service.index().get("http://a.com"), Some(code));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn store_fallback_can_be_disabled() {
        let (repo, service) = shared_service(
            SeqGenerator::with_prefix("wh"),
            ShortenerSettings::builder().reuse_from_store(false).build(),
        );
        repo.put(UrlRecord::new(
            ShortCode::new("old001"),
            "http://a.com",
            CodeKind::Generated,
        ))
        .await
        .unwrap();

        let code = service
            .create(ShortenParams::generated("a.com"))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "wh000000");
    }

    #[tokio::test]
    async fn custom_record_is_not_reused_for_generation() {
        let service = test_service();

        service
            .create(ShortenParams::custom("https://a.com", "mine"))
            .await
            .unwrap();
        let code = service
            .create(ShortenParams::generated("https://a.com"))
            .await
            .unwrap();

        assert_eq!(code.as_str(), "wh000000");
        assert_eq!(service.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn index_hit_repersists_missing_record() {
        let (repo, service) =
            shared_service(SeqGenerator::with_prefix("wh"), ShortenerSettings::default());
        service
            .index()
            .insert("http://a.com", ShortCode::new("kept01"));

        let code = service
            .create(ShortenParams::generated("a.com"))
            .await
            .unwrap();
        assert_eq!(code.as_str(), "kept01");
        let stored = repo.get(&code).await.unwrap().unwrap();
        assert_eq!(stored.long_url, "http://a.com");
    }

    #[tokio::test]
    async fn resolve_counts_clicks_case_insensitively() {
        let service = test_service();
        service
            .create(ShortenParams::custom("https://example.com", "AbC123"))
            .await
            .unwrap();

        assert_eq!(service.resolve("abc123").await.unwrap(), "http://example.com");
        assert_eq!(service.resolve("ABC123").await.unwrap(), "http://example.com");

        let records = service.list_all().await.unwrap();
        assert_eq!(records[0].click_count, 2);
    }

    #[tokio::test]
    async fn resolve_nonexistent_code() {
        let service = test_service();

        let err = service.resolve("nonexistent").await.unwrap_err();
        assert!(matches!(err, ShortenerError::CodeNotFound(code) if code == "nonexistent"));
    }

    #[tokio::test]
    async fn update_keeps_code_and_clicks() {
        let service = test_service();
        let code = service
            .create(ShortenParams::generated("https://old.com"))
            .await
            .unwrap();
        service.resolve(code.as_str()).await.unwrap();

        service
            .update(&code.as_str().to_uppercase(), "https://www.New.com/")
            .await
            .unwrap();

        let records = service.list_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].short_code, code);
        assert_eq!(records[0].long_url, "http://new.com");
        assert_eq!(records[0].click_count, 1);

        assert_eq!(service.index().get("http://old.com"), None);
        assert_eq!(service.index().get("http://new.com"), Some(code));
    }

    #[tokio::test]
    async fn update_rejects_unknown_code_and_bad_url() {
        let service = test_service();
        service
            .create(ShortenParams::custom("https://a.com", "abc123"))
            .await
            .unwrap();

        let err = service.update("zzz999", "https://b.com").await.unwrap_err();
        assert!(matches!(err, ShortenerError::CodeNotFound(_)));

        let err = service.update("abc123", "exa mple.com").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrlFormat(_)));
        assert_eq!(service.resolve("abc123").await.unwrap(), "http://a.com");
    }

    #[tokio::test]
    async fn old_url_gets_fresh_code_after_update() {
        let service = test_service();
        let first = service
            .create(ShortenParams::generated("https://old.com"))
            .await
            .unwrap();
        service.update(first.as_str(), "https://new.com").await.unwrap();

        let second = service
            .create(ShortenParams::generated("https://old.com"))
            .await
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(service.resolve(second.as_str()).await.unwrap(), "http://old.com");
    }

    #[tokio::test]
    async fn delete_evicts_index_entry() {
        let service = test_service();
        let code = service
            .create(ShortenParams::generated("https://example.com"))
            .await
            .unwrap();

        service.delete(&code.as_str().to_lowercase()).await.unwrap();

        assert!(service.index().is_empty());
        let err = service.resolve(code.as_str()).await.unwrap_err();
        assert!(matches!(err, ShortenerError::CodeNotFound(_)));

        let again = service
            .create(ShortenParams::generated("https://example.com"))
            .await
            .unwrap();
        assert_ne!(again, code);
    }

    #[tokio::test]
    async fn delete_prefers_exact_key() {
        let (repo, service) =
            shared_service(SeqGenerator::with_prefix("wh"), ShortenerSettings::default());
        for code in ["abc123", "ABC123"] {
            repo.put(UrlRecord::new(
                ShortCode::new(code),
                format!("http://{code}.com"),
                CodeKind::Custom,
            ))
            .await
            .unwrap();
        }

        service.delete("ABC123").await.unwrap();

        assert!(repo.get(&ShortCode::new("abc123")).await.unwrap().is_some());
        assert!(repo.get(&ShortCode::new("ABC123")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_nonexistent_code() {
        let service = test_service();

        let err = service.delete("nonexistent").await.unwrap_err();
        assert!(matches!(err, ShortenerError::CodeNotFound(_)));
    }

    #[tokio::test]
    async fn rebuild_index_from_store() {
        let (repo, service) =
            shared_service(SeqGenerator::with_prefix("wh"), ShortenerSettings::default());
        repo.put(UrlRecord::new(
            ShortCode::new("gen001"),
            "http://a.com",
            CodeKind::Generated,
        ))
        .await
        .unwrap();
        repo.put(UrlRecord::new(
            ShortCode::new("mine"),
            "http://b.com",
            CodeKind::Custom,
        ))
        .await
        .unwrap();

        assert_eq!(service.rebuild_index().await.unwrap(), 1);
        assert_eq!(
            service.index().get("http://a.com"),
            Some(ShortCode::new("gen001"))
        );
        assert_eq!(service.index().get("http://b.com"), None);
    }
}
