//! Statistics monitor: per-batch distribution snapshots
//!
//! On every write batch, one snapshot is computed per numeric feature present
//! in the batch, over exactly that batch (not a running aggregate). Snapshots
//! are appended to the offline statistics table and never mutated; drift
//! detection is the consumer's responsibility, computed externally by
//! comparing snapshots over time.
//!
//! Conventions:
//!
//! - a feature counts as numeric in a batch when it has at least one Int or
//!   Float value and no non-null values of any other type
//! - `count` is the number of non-null numeric values; `null_count` is the
//!   number of records where the feature is absent or null
//! - `std` is the population standard deviation
//! - percentiles use linear interpolation between closest ranks

use crate::types::{FeatureGroup, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable distribution snapshot for one feature over one write batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureStatistics {
    pub feature_group: String,
    pub feature_name: String,
    #[serde(with = "chrono::serde::ts_microseconds")]
    pub computed_at: DateTime<Utc>,
    pub count: i64,
    pub null_count: i64,
    pub unique_count: i64,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Computes snapshots for every numeric declared feature present in the batch
pub fn compute_batch_statistics(
    group: &FeatureGroup,
    batch: &[Record],
    computed_at: DateTime<Utc>,
) -> Vec<FeatureStatistics> {
    let mut snapshots = Vec::new();

    for feature in &group.features {
        let mut values = Vec::new();
        let mut null_count = 0i64;
        let mut non_numeric = 0usize;

        for record in batch {
            match record.get(feature) {
                None | Some(crate::FeatureValue::Null) => null_count += 1,
                Some(v) => match v.as_f64() {
                    Some(x) => values.push(x),
                    None => non_numeric += 1,
                },
            }
        }

        // Strings/bools make the feature non-numeric for this batch
        if values.is_empty() || non_numeric > 0 {
            continue;
        }

        let mut sorted = values.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut unique_bits: Vec<u64> = sorted.iter().map(|v| v.to_bits()).collect();
        unique_bits.dedup();

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        snapshots.push(FeatureStatistics {
            feature_group: group.name.clone(),
            feature_name: feature.clone(),
            computed_at,
            count: values.len() as i64,
            null_count,
            unique_count: unique_bits.len() as i64,
            mean,
            std: variance.sqrt(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        });
    }

    snapshots
}

/// Linear-interpolated percentile over an ascending-sorted, non-empty slice
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}
