//! Offline store trait for durable, append-only feature history
//!
//! The offline store is the single source of truth: one append-only table per
//! feature group, bulk appends on the write path, and time/entity filtered
//! range reads on the historical read path. Feature records are never updated
//! or deleted individually; a group's whole table is dropped when the group is
//! deleted.
//!
//! The statistics table also lives here: immutable per-batch distribution
//! snapshots, appended by the write path and read by external drift detection.

use crate::stats::FeatureStatistics;
use crate::{FeatureValue, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// One durable feature record, as stored and as returned by range reads
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineRecord {
    /// Entity key: entity column values joined by ':' in declared order
    pub entity_key: String,

    /// Entity column name -> value, preserved for read-path output
    pub entities: HashMap<String, FeatureValue>,

    /// Event timestamp of the record
    pub timestamp: DateTime<Utc>,

    /// Feature name -> value for the features present in the written record
    pub features: HashMap<String, FeatureValue>,
}

/// Trait for durable feature stores
///
/// Writes block the caller; reads are range scans ordered by
/// `(entity_key, timestamp)` so callers can tolerate out-of-order arrival
/// on the write side.
#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Creates the append-only table for a feature group (idempotent)
    async fn create_table(&self, feature_group: &str) -> Result<()>;

    /// Drops a feature group's table and all its history
    async fn drop_table(&self, feature_group: &str) -> Result<()>;

    /// Appends a batch of records, chunked for large batches
    ///
    /// Returns the number of rows appended.
    async fn append(&self, feature_group: &str, records: Vec<OfflineRecord>) -> Result<usize>;

    /// Range read: records with `start <= timestamp <= end`, filtered to the
    /// given entity keys (an empty slice means no entity filter), ordered by
    /// `(entity_key, timestamp)`.
    async fn range_query(
        &self,
        feature_group: &str,
        entity_keys: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OfflineRecord>>;

    /// Appends statistics snapshots (never merged with prior snapshots)
    async fn save_statistics(&self, snapshots: &[FeatureStatistics]) -> Result<()>;

    /// Snapshots for one feature of one group, newest first
    async fn get_statistics(
        &self,
        feature_group: &str,
        feature_name: &str,
    ) -> Result<Vec<FeatureStatistics>>;

    /// Returns Ok(()) if the store is ready
    async fn health_check(&self) -> Result<()>;

    /// Name of this store type, for logging
    fn store_type(&self) -> &'static str;
}
