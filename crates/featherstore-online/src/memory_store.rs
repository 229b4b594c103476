//! Embedded in-memory online store
//!
//! A TTL-bounded, last-write-wins key-value map. Used for embedded
//! deployments and testing; the serving semantics (overwrite on write, miss
//! on expiry, prefix deletion) match the Redis adapter exactly.
//!
//! Time is read through an internal offset so tests can advance the clock and
//! observe TTL expiry without sleeping.

use async_trait::async_trait;
use featherstore_core::{recover_mutex, recover_read, recover_write, OnlineEntry, OnlineStore, Result};
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

struct StoredEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// In-memory online store with a test clock
#[derive(Default)]
pub struct MemoryOnlineStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    clock_offset: Mutex<Duration>,
}

impl MemoryOnlineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the store's clock, expiring entries whose TTL has elapsed
    ///
    /// Test hook: simulates the passage of time without sleeping.
    pub fn advance_clock(&self, by: Duration) {
        if let Ok(mut offset) = recover_mutex(&self.clock_offset, "memory store clock") {
            *offset += by;
        }
    }

    /// Keys currently live (not expired) under a prefix
    ///
    /// Inspection hook used by lifecycle tests to verify namespace cleanup.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let now = self.now();
        recover_read(&self.entries, "memory online store")
            .iter()
            .filter(|(key, entry)| key.starts_with(prefix) && entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn now(&self) -> Instant {
        let offset = recover_mutex(&self.clock_offset, "memory store clock")
            .map(|guard| *guard)
            .unwrap_or_default();
        Instant::now() + offset
    }
}

#[async_trait]
impl OnlineStore for MemoryOnlineStore {
    async fn get_entries(&self, keys: &[String]) -> Result<Vec<Option<OnlineEntry>>> {
        let now = self.now();
        let mut results = Vec::with_capacity(keys.len());
        let mut saw_expired = false;

        {
            let entries = recover_read(&self.entries, "memory online store");
            for key in keys {
                match entries.get(key) {
                    Some(entry) if entry.expires_at > now => {
                        results.push(Some(serde_json::from_slice(&entry.payload)?));
                    }
                    Some(_) => {
                        saw_expired = true;
                        results.push(None);
                    }
                    None => results.push(None),
                }
            }
        }

        // Lazy expiry: prune dead entries we just walked past
        if saw_expired {
            let mut entries = recover_write(&self.entries, "memory online store");
            for key in keys {
                if entries.get(key).is_some_and(|e| e.expires_at <= now) {
                    entries.remove(key);
                }
            }
        }

        Ok(results)
    }

    async fn set_entries(&self, new: Vec<(String, OnlineEntry)>, ttl: Duration) -> Result<()> {
        if new.is_empty() {
            return Ok(());
        }
        let expires_at = self.now() + ttl;
        let count = new.len();

        let mut entries = recover_write(&self.entries, "memory online store");
        for (key, entry) in new {
            let payload = serde_json::to_vec(&entry)?;
            // Last write wins, unconditionally
            entries.insert(key, StoredEntry { payload, expires_at });
        }
        debug!(rows_written = count, "Memory online store write complete");
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = recover_write(&self.entries, "memory online store");
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use featherstore_core::{build_online_key, online_key_prefix, FeatureValue};

    fn entry(cpu: f64) -> OnlineEntry {
        let mut features = HashMap::new();
        features.insert("cpu".to_string(), FeatureValue::Float(cpu));
        OnlineEntry {
            features,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = MemoryOnlineStore::new();
        let key = build_online_key("server_metrics", "h1");

        store
            .set_entries(vec![(key.clone(), entry(50.0))], Duration::from_secs(60))
            .await
            .unwrap();

        let results = store.get_entries(&[key]).await.unwrap();
        assert_eq!(
            results[0].as_ref().unwrap().features.get("cpu"),
            Some(&FeatureValue::Float(50.0))
        );
    }

    #[tokio::test]
    async fn test_miss_is_none_not_error() {
        let store = MemoryOnlineStore::new();
        let results = store
            .get_entries(&[build_online_key("server_metrics", "never_written")])
            .await
            .unwrap();
        assert_eq!(results, vec![None]);
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemoryOnlineStore::new();
        let key = build_online_key("server_metrics", "h1");

        store
            .set_entries(vec![(key.clone(), entry(50.0))], Duration::from_secs(60))
            .await
            .unwrap();
        store
            .set_entries(vec![(key.clone(), entry(70.0))], Duration::from_secs(60))
            .await
            .unwrap();

        let results = store.get_entries(&[key]).await.unwrap();
        assert_eq!(
            results[0].as_ref().unwrap().features.get("cpu"),
            Some(&FeatureValue::Float(70.0))
        );
    }

    #[tokio::test]
    async fn test_ttl_expiry_via_clock() {
        let store = MemoryOnlineStore::new();
        let key = build_online_key("server_metrics", "h1");

        store
            .set_entries(vec![(key.clone(), entry(50.0))], Duration::from_secs(60))
            .await
            .unwrap();

        store.advance_clock(Duration::from_secs(61));
        let results = store.get_entries(&[key.clone()]).await.unwrap();
        assert_eq!(results, vec![None]);

        // Expired entry was pruned, not just hidden
        assert!(store.keys_with_prefix("features:").is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_after_expiry_self_heals() {
        let store = MemoryOnlineStore::new();
        let key = build_online_key("server_metrics", "h1");

        store
            .set_entries(vec![(key.clone(), entry(50.0))], Duration::from_secs(60))
            .await
            .unwrap();
        store.advance_clock(Duration::from_secs(120));
        store
            .set_entries(vec![(key.clone(), entry(70.0))], Duration::from_secs(60))
            .await
            .unwrap();

        let results = store.get_entries(&[key]).await.unwrap();
        assert!(results[0].is_some());
    }

    #[tokio::test]
    async fn test_delete_by_prefix_scopes_to_namespace() {
        let store = MemoryOnlineStore::new();
        store
            .set_entries(
                vec![
                    (build_online_key("server_metrics", "h1"), entry(1.0)),
                    (build_online_key("server_metrics", "h2"), entry(2.0)),
                    (build_online_key("server_metrics_v2", "h1"), entry(3.0)),
                ],
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let removed = store
            .delete_by_prefix(&online_key_prefix("server_metrics"))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        // The similarly-named group's namespace is untouched
        assert_eq!(
            store
                .keys_with_prefix(&online_key_prefix("server_metrics_v2"))
                .len(),
            1
        );
    }
}
