//! Online store trait for low-latency feature serving
//!
//! The online store is a TTL-bounded, last-write-wins key-value cache over the
//! latest feature values per entity. It may be stale or empty relative to the
//! offline store; a miss is a valid (if degraded) outcome for readers, and the
//! next write for an entity repairs staleness.
//!
//! ## Key format
//!
//! One key per `(feature_group, entity key)` pair:
//!
//! ```text
//! features:{feature_group}:{entity values joined by ':'}
//! ```
//!
//! Entity values appear in the group's `entity_columns` order. The
//! `features:{feature_group}:` prefix is the group's whole online namespace,
//! which the lifecycle manager scans and deletes when a group is dropped.

use crate::{FeatureValue, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Serialized payload stored at each online key
///
/// Always reflects the most recent successful online write for that
/// entity/group: the latest feature map plus its event timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OnlineEntry {
    /// Latest feature name -> value map for the entity
    pub features: HashMap<String, FeatureValue>,

    /// Event timestamp of the write that produced this entry
    pub timestamp: DateTime<Utc>,
}

/// Builds the online key for an entity of a feature group
pub fn build_online_key(feature_group: &str, entity_key: &str) -> String {
    format!("features:{feature_group}:{entity_key}")
}

/// The key-namespace prefix owned by a feature group
pub fn online_key_prefix(feature_group: &str) -> String {
    format!("features:{feature_group}:")
}

/// Trait for online feature stores (in-memory, Redis, ...)
///
/// ## Implementation requirements
///
/// - Batched operations: one logical round-trip for N keys where the backend
///   allows it (pipelining)
/// - Last-write-wins overwrite semantics, no conflict resolution
/// - TTL honored per write
/// - Thread-safe (`Send + Sync`)
#[async_trait]
pub trait OnlineStore: Send + Sync {
    /// Fetches entries for the given keys, in order
    ///
    /// Absent keys (never written, expired, evicted) are `None`, never errors.
    async fn get_entries(&self, keys: &[String]) -> Result<Vec<Option<OnlineEntry>>>;

    /// Writes entries with the given TTL, overwriting existing values
    ///
    /// Implementations batch/pipeline for throughput but must not acknowledge
    /// before the write is applied.
    async fn set_entries(&self, entries: Vec<(String, OnlineEntry)>, ttl: Duration) -> Result<()>;

    /// Deletes every key under the given prefix, returning the count removed
    ///
    /// Used by the lifecycle manager when a feature group is dropped.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<usize>;

    /// Returns Ok(()) if the store is ready to serve requests
    async fn health_check(&self) -> Result<()>;

    /// Name of this store type, for logging
    fn store_type(&self) -> &'static str;
}
