use async_trait::async_trait;
use redis::AsyncCommands;
use shorty_core::repository::{ReadRepository, Repository, Result, UrlRecord};
use shorty_core::{ShortCode, StorageError};
use tracing::{debug, trace, warn};

/// Default namespace for every key the repository owns.
pub const DEFAULT_KEY_PREFIX: &str = "shorty:url:";

const SCAN_BATCH: usize = 256;

// KEYS: record, fold hash, url hash. ARGV: folded code, code, long url.
const DELETE_SCRIPT: &str = r"
if redis.call('DEL', KEYS[1]) == 0 then
    return 0
end
if redis.call('HGET', KEYS[2], ARGV[1]) == ARGV[2] then
    redis.call('HDEL', KEYS[2], ARGV[1])
end
if ARGV[3] ~= '' and redis.call('HGET', KEYS[3], ARGV[3]) == ARGV[2] then
    redis.call('HDEL', KEYS[3], ARGV[3])
end
return 1
";

// KEYS: hash. ARGV: field, expected value.
const UNLINK_IF_SCRIPT: &str = r"
if redis.call('HGET', KEYS[1], ARGV[1]) == ARGV[2] then
    return redis.call('HDEL', KEYS[1], ARGV[1])
end
return 0
";

/// A Redis-backed repository.
///
/// Keys under `<prefix>`:
///
/// - `code:<short code>` holds each record as a JSON string.
/// - `fold` is a hash from lower-cased code to the exact stored code.
/// - `url` is a hash from long URL to the code of a generated record.
///
/// Case-insensitive lookups and URL lookups cost a constant number of
/// round trips. Only `list_all` walks the keyspace, with
/// `SCAN MATCH <prefix>code:*` in batches.
#[derive(Clone)]
pub struct RedisRepository {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
    delete_script: redis::Script,
    unlink_if_script: redis::Script,
}

impl std::fmt::Debug for RedisRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRepository")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> StorageError {
    let message = format!("{operation}: {err}");
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("timed out") {
        StorageError::Timeout(message)
    } else if lowered.contains("connection refused") || lowered.contains("broken pipe") {
        StorageError::Unavailable(message)
    } else {
        StorageError::Operation(message)
    }
}

fn record_key(prefix: &str, code: &str) -> String {
    format!("{prefix}code:{code}")
}

fn fold_key(prefix: &str) -> String {
    format!("{prefix}fold")
}

fn url_key(prefix: &str) -> String {
    format!("{prefix}url")
}

fn scan_pattern(prefix: &str) -> String {
    // Glob metacharacters in the prefix must not widen the match.
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push_str("code:*");
    pattern
}

fn decode_record(key: &str, raw: &str) -> Result<UrlRecord> {
    serde_json::from_str::<UrlRecord>(raw).map_err(|e| {
        StorageError::InvalidData(format!("invalid record stored under '{key}': {e}"))
    })
}

impl RedisRepository {
    /// Creates a repository over an existing multiplexed connection.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    /// Creates a repository with a custom key prefix (e.g. "myapp:url:").
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            delete_script: redis::Script::new(DELETE_SCRIPT),
            unlink_if_script: redis::Script::new(UNLINK_IF_SCRIPT),
        }
    }

    /// Opens a client for `redis_url` and connects.
    pub async fn connect(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StorageError::Unavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to Redis", e))?;
        Ok(Self::with_prefix(conn, key_prefix))
    }

    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    fn key(&self, code: &ShortCode) -> String {
        record_key(&self.key_prefix, code.as_str())
    }

    async fn fetch(&self, key: &str) -> Result<Option<UrlRecord>> {
        let mut conn = self.conn.clone();
        let raw = conn
            .get::<_, Option<String>>(key)
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "Redis error on get");
                map_redis_error("failed to fetch value from Redis", e)
            })?;

        raw.map(|raw| decode_record(key, &raw)).transpose()
    }

    async fn lookup(&self, hash: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.hget::<_, _, Option<String>>(hash, field)
            .await
            .map_err(|e| map_redis_error("failed to read secondary key from Redis", e))
    }

    /// Drops `hash[field]` if it still points at `code`.
    async fn unlink_if(&self, hash: &str, field: &str, code: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.unlink_if_script
            .key(hash)
            .arg(field)
            .arg(code)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to unlink secondary key in Redis", e))?;
        Ok(())
    }

    async fn scan_keys(&self) -> Result<Vec<String>> {
        let pattern = scan_pattern(&self.key_prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("failed to scan Redis keys", e))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once.
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }
}

#[async_trait]
impl ReadRepository for RedisRepository {
    async fn get(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        trace!(code = %code, "fetching record from Redis");
        let record = self.fetch(&self.key(code)).await?;
        if record.is_none() {
            trace!(code = %code, "no record in Redis");
        }
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<UrlRecord>> {
        let keys = self.scan_keys().await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let mut records = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(SCAN_BATCH) {
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(chunk)
                .query_async(&mut conn)
                .await
                .map_err(|e| map_redis_error("failed to fetch values from Redis", e))?;

            for (key, raw) in chunk.iter().zip(values) {
                // Deleted between SCAN and MGET.
                let Some(raw) = raw else { continue };
                records.push(decode_record(key, &raw)?);
            }
        }

        debug!(count = records.len(), "listed records from Redis");
        Ok(records)
    }

    async fn get_ignore_case(&self, code: &ShortCode) -> Result<Option<UrlRecord>> {
        if let Some(record) = self.get(code).await? {
            return Ok(Some(record));
        }

        let folded = code.folded();
        let Some(stored) = self.lookup(&fold_key(&self.key_prefix), &folded).await? else {
            return Ok(None);
        };
        if stored == code.as_str() {
            return Ok(None);
        }

        trace!(code = %code, stored = %stored, "resolved code through fold index");
        self.fetch(&record_key(&self.key_prefix, &stored)).await
    }

    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<UrlRecord>> {
        let url_hash = url_key(&self.key_prefix);
        let Some(code) = self.lookup(&url_hash, long_url).await? else {
            return Ok(None);
        };

        match self.fetch(&record_key(&self.key_prefix, &code)).await? {
            Some(record) if record.long_url == long_url && record.is_generated() => {
                Ok(Some(record))
            }
            _ => {
                debug!(code = %code, url = %long_url, "dropping stale url entry");
                self.unlink_if(&url_hash, long_url, &code).await?;
                Ok(None)
            }
        }
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(self.key(code))
            .await
            .map_err(|e| map_redis_error("failed to check key in Redis", e))
    }
}

#[async_trait]
impl Repository for RedisRepository {
    async fn put(&self, record: UrlRecord) -> Result<()> {
        let key = self.key(&record.short_code);
        let json = serde_json::to_string(&record).map_err(|e| {
            StorageError::Serialization(format!("failed to serialize record: {e}"))
        })?;

        let code = record.short_code.as_str();
        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(&key, json)
            .ignore()
            .hset(fold_key(&self.key_prefix), record.short_code.folded(), code)
            .ignore();
        if record.is_generated() {
            pipe.hset(url_key(&self.key_prefix), &record.long_url, code)
                .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await.map_err(|e| {
            warn!(code = %record.short_code, error = %e, "failed to write record to Redis");
            map_redis_error("failed to write value to Redis", e)
        })?;

        debug!(code = %record.short_code, "stored record in Redis");
        Ok(())
    }

    async fn delete(&self, code: &ShortCode) -> Result<bool> {
        let key = self.key(code);
        // An undecodable record is still removed; its url entry goes stale.
        let long_url = match self.fetch(&key).await {
            Ok(Some(record)) => record.long_url,
            Ok(None) => return Ok(false),
            Err(e @ StorageError::InvalidData(_)) => {
                warn!(code = %code, error = %e, "deleting undecodable record");
                String::new()
            }
            Err(e) => return Err(e),
        };

        let mut conn = self.conn.clone();
        let removed = self
            .delete_script
            .key(&key)
            .key(fold_key(&self.key_prefix))
            .key(url_key(&self.key_prefix))
            .arg(code.folded())
            .arg(code.as_str())
            .arg(long_url)
            .invoke_async::<i64>(&mut conn)
            .await
            .map_err(|e| map_redis_error("failed to delete value from Redis", e))?;

        debug!(code = %code, removed, "deleted record from Redis");
        Ok(removed > 0)
    }
}
