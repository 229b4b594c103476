//! Redis online store adapter
//!
//! ## Performance Notes
//!
//! 1. **Pipeline batching**: writes use Redis pipelines (one round-trip per chunk)
//! 2. **Connection pooling**: multiplexed connection manager (one TCP connection,
//!    concurrent requests)
//! 3. **MGET reads**: all requested keys fetched in a single round-trip
//!
//! TTL is enforced server-side via `SET ... EX`, so expiry needs no sweeper on
//! our end. Prefix deletion walks the keyspace with cursored `SCAN MATCH` to
//! stay non-blocking on large instances.

use async_trait::async_trait;
use featherstore_core::{Error, OnlineEntry, OnlineStore, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Pipeline};
use std::time::Duration;
use tracing::debug;

/// Redis online store configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Pipeline batch size for writes (larger = faster but more memory)
    pub write_batch_size: usize,
    /// Number of keys requested per SCAN iteration during prefix deletion
    pub scan_count: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            write_batch_size: 1000,
            scan_count: 500,
        }
    }
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Redis-backed online store
///
/// Uses ConnectionManager for multiplexed connections (one TCP connection,
/// many concurrent requests). Every entry is a JSON blob under a
/// `features:{group}:{entity_key}` key with a server-side TTL.
pub struct RedisOnlineStore {
    conn: ConnectionManager,
    config: RedisConfig,
}

impl RedisOnlineStore {
    /// Connect to Redis and build the store
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())
            .map_err(|e| Error::store_unavailable(format!("Redis connection error: {e}")))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::store_unavailable(format!("Redis connection manager error: {e}")))?;

        Ok(Self { conn, config })
    }

    fn serialize_entry(entry: &OnlineEntry) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(entry)?)
    }

    fn deserialize_entry(data: &[u8]) -> Result<OnlineEntry> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[async_trait]
impl OnlineStore for RedisOnlineStore {
    /// Fetch entries for all keys in a single MGET round-trip
    ///
    /// Missing or expired keys come back as `None` in position.
    async fn get_entries(&self, keys: &[String]) -> Result<Vec<Option<OnlineEntry>>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = conn
            .mget(keys)
            .await
            .map_err(|e| Error::store_unavailable(format!("Redis MGET error: {e}")))?;

        let mut results = Vec::with_capacity(keys.len());
        for value in values {
            results.push(match value {
                Some(data) => Some(Self::deserialize_entry(&data)?),
                None => None,
            });
        }
        Ok(results)
    }

    /// Write entries as pipelined `SET key value EX ttl` commands
    ///
    /// Unconditional overwrite: the newest write for a key wins.
    async fn set_entries(&self, entries: Vec<(String, OnlineEntry)>, ttl: Duration) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let total = entries.len();
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);

        for chunk in entries.chunks(self.config.write_batch_size) {
            let mut pipe = Pipeline::new();
            for (key, entry) in chunk {
                pipe.set_ex(key, Self::serialize_entry(entry)?, ttl_secs);
            }
            pipe.query_async::<_, ()>(&mut conn)
                .await
                .map_err(|e| Error::store_unavailable(format!("Redis pipeline error: {e}")))?;
        }

        debug!(rows_written = total, "Redis online store write complete");
        Ok(())
    }

    /// Delete every key under a prefix via cursored SCAN + pipelined DEL
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| Error::store_unavailable(format!("Redis SCAN error: {e}")))?;

            if !keys.is_empty() {
                let deleted: usize = conn
                    .del(&keys)
                    .await
                    .map_err(|e| Error::store_unavailable(format!("Redis DEL error: {e}")))?;
                removed += deleted;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(prefix = prefix, keys_removed = removed, "Redis prefix delete complete");
        Ok(removed)
    }

    /// Health check using PING
    async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::store_unavailable(format!("Redis PING failed: {e}")))?;

        if pong != "PONG" {
            return Err(Error::store_unavailable(format!(
                "Redis health check failed: expected PONG, got {pong}"
            )));
        }

        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}
