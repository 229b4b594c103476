//! Write path: validate, land offline, refresh online, snapshot statistics
//!
//! Order is fixed:
//!
//! 1. resolve the feature group and validate the whole batch (no storage
//!    touched on failure)
//! 2. append to the offline store; failure aborts the write with
//!    `StoreUnavailable`
//! 3. refresh the online cache; failure is logged and reported as degraded,
//!    never as an error, since the offline source of truth already holds the
//!    data
//! 4. compute and persist one statistics snapshot per numeric feature; the
//!    snapshot exists before the call returns

use crate::{with_timeout, FeatureStore};
use chrono::{DateTime, Utc};
use featherstore_core::{
    build_online_key, compute_batch_statistics, record_timestamp, validate_batch, FeatureGroup,
    FeatureValue, OfflineRecord, OnlineEntry, Record, Result,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Per-call options for [`FeatureStore::write_features`]
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// TTL for the online entries written by this call; the store default
    /// applies when absent
    pub ttl: Option<Duration>,

    /// Refresh the online cache (off for backfills of historical data, which
    /// should not overwrite fresher values)
    pub write_online: bool,

    /// Append to the durable history (off for cache-only refreshes)
    pub write_offline: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            ttl: None,
            write_online: true,
            write_offline: true,
        }
    }
}

impl WriteOptions {
    /// Offline-only write, for loading historical data
    pub fn backfill() -> Self {
        Self {
            write_online: false,
            ..Self::default()
        }
    }
}

/// Outcome of one write call
#[derive(Debug)]
pub struct WriteSummary {
    pub feature_group: String,

    /// Rows appended to the offline store
    pub rows_written: usize,

    /// Distinct entities refreshed in the online cache
    pub online_entities: usize,

    /// True when the online refresh failed or was skipped; offline data is
    /// still durable and the next write repairs the cache
    pub online_degraded: bool,

    /// Non-fatal validation findings (e.g. declared features absent)
    pub warnings: Vec<String>,

    /// Statistics snapshots persisted for this batch
    pub snapshots: usize,
}

impl FeatureStore {
    /// Write a batch of records to a feature group
    ///
    /// The batch is validated as a whole before any storage is touched; a
    /// violation in any record rejects the entire batch.
    pub async fn write_features(
        &self,
        feature_group: &str,
        batch: Vec<Record>,
        options: WriteOptions,
    ) -> Result<WriteSummary> {
        let group = self.catalog().get_feature_group(feature_group).await?;
        let report = validate_batch(&group, &batch)?;

        let mut rows_written = 0;
        if options.write_offline {
            let records = to_offline_records(&group, &batch)?;
            rows_written = with_timeout(
                self.config().offline_timeout(),
                "offline append",
                self.offline().append(&group.name, records),
            )
            .await?;
        }

        let mut online_entities = 0;
        let mut online_degraded = !options.write_online;
        if options.write_online {
            let entries = latest_online_entries(&group, &batch)?;
            online_entities = entries.len();
            let ttl = options.ttl.unwrap_or_else(|| self.config().default_ttl());

            let outcome = with_timeout(
                self.config().online_timeout(),
                "online refresh",
                self.online().set_entries(entries, ttl),
            )
            .await;
            if let Err(e) = outcome {
                // Degrades freshness only; the offline append already succeeded
                warn!(
                    feature_group = %group.name,
                    error = %e,
                    "Online refresh failed, serving path is degraded"
                );
                online_entities = 0;
                online_degraded = true;
            }
        }

        let snapshots = compute_batch_statistics(&group, &batch, Utc::now());
        with_timeout(
            self.config().offline_timeout(),
            "statistics append",
            self.offline().save_statistics(&snapshots),
        )
        .await?;

        info!(
            feature_group = %group.name,
            rows = rows_written,
            online_entities,
            snapshots = snapshots.len(),
            "Write complete"
        );

        Ok(WriteSummary {
            feature_group: group.name,
            rows_written,
            online_entities,
            online_degraded,
            warnings: report.warnings,
            snapshots: snapshots.len(),
        })
    }
}

/// Splits validated records into durable rows
fn to_offline_records(group: &FeatureGroup, batch: &[Record]) -> Result<Vec<OfflineRecord>> {
    let mut records = Vec::with_capacity(batch.len());
    for record in batch {
        let entity_key = group.entity_key_of(record)?;
        let timestamp = record_timestamp(record, &group.timestamp_column)?;

        let mut entities = HashMap::with_capacity(group.entity_columns.len());
        for column in &group.entity_columns {
            if let Some(value) = record.get(column) {
                entities.insert(column.clone(), value.clone());
            }
        }

        // Validation already rejected undeclared columns
        let features: HashMap<String, FeatureValue> = record
            .iter()
            .filter(|(name, _)| group.features.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        records.push(OfflineRecord {
            entity_key,
            entities,
            timestamp,
            features,
        });
    }
    Ok(records)
}

/// Reduces a batch to one online entry per entity, keeping the latest record
///
/// Within a single batch the record with the greatest event timestamp wins,
/// so out-of-order rows in the same call cannot clobber fresher values.
fn latest_online_entries(
    group: &FeatureGroup,
    batch: &[Record],
) -> Result<Vec<(String, OnlineEntry)>> {
    let mut latest: HashMap<String, (DateTime<Utc>, &Record)> = HashMap::new();
    for record in batch {
        let entity_key = group.entity_key_of(record)?;
        let timestamp = record_timestamp(record, &group.timestamp_column)?;
        match latest.get(&entity_key) {
            Some((existing, _)) if *existing >= timestamp => {}
            _ => {
                latest.insert(entity_key, (timestamp, record));
            }
        }
    }

    let mut entries = Vec::with_capacity(latest.len());
    for (entity_key, (timestamp, record)) in latest {
        let features: HashMap<String, FeatureValue> = record
            .iter()
            .filter(|(name, _)| group.features.contains(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        entries.push((
            build_online_key(&group.name, &entity_key),
            OnlineEntry {
                features,
                timestamp,
            },
        ));
    }
    Ok(entries)
}
