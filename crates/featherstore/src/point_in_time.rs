//! Point-in-time correct join across feature groups
//!
//! The historical read path fans out one range read per feature group and
//! joins them here. The join spine is the set of distinct
//! `(entity_key, timestamp)` pairs observed in any group's records; for each
//! spine point, every group contributes its latest record for that entity at
//! or before the spine timestamp. A group with no record at or before that
//! instant contributes nulls, never a value from the future. This is what
//! makes training reads leakage-free.

use chrono::{DateTime, Utc};
use featherstore_core::{FeatureGroup, FeatureRow, FeatureValue, OfflineRecord};
use std::collections::{BTreeSet, HashMap};

/// Joins per-group record slices into point-in-time correct result rows
///
/// Input records must be ordered by `(entity_key, timestamp)`, as the offline
/// store's range reads return them. Output rows are ordered the same way.
pub(crate) fn as_of_join(
    requested_features: &[String],
    view_entities: &[String],
    slices: &[(FeatureGroup, Vec<OfflineRecord>)],
) -> Vec<FeatureRow> {
    // Spine: every observation instant of every entity, deduplicated
    let mut spine: BTreeSet<(&str, DateTime<Utc>)> = BTreeSet::new();
    for (_, records) in slices {
        for record in records {
            spine.insert((record.entity_key.as_str(), record.timestamp));
        }
    }

    // Per group, per entity: records in timestamp order (input order preserved)
    let mut indexes: Vec<HashMap<&str, Vec<&OfflineRecord>>> = Vec::with_capacity(slices.len());
    for (_, records) in slices {
        let mut index: HashMap<&str, Vec<&OfflineRecord>> = HashMap::new();
        for record in records {
            index.entry(record.entity_key.as_str()).or_default().push(record);
        }
        indexes.push(index);
    }

    let mut rows = Vec::with_capacity(spine.len());
    for (entity_key, timestamp) in spine {
        let mut features: HashMap<String, FeatureValue> = requested_features
            .iter()
            .map(|f| (f.clone(), FeatureValue::Null))
            .collect();
        let mut entities: HashMap<String, FeatureValue> = HashMap::new();

        for ((group, _), index) in slices.iter().zip(&indexes) {
            let Some(history) = index.get(entity_key) else { continue };
            // Latest record at or before the spine instant
            let at = history.partition_point(|r| r.timestamp <= timestamp);
            if at == 0 {
                continue;
            }
            let record = history[at - 1];

            for feature in requested_features {
                if !group.features.contains(feature) {
                    continue;
                }
                if let Some(value) = record.features.get(feature) {
                    features.insert(feature.clone(), value.clone());
                }
            }
            for column in view_entities {
                if let Some(value) = record.entities.get(column) {
                    entities.entry(column.clone()).or_insert_with(|| value.clone());
                }
            }
        }

        rows.push(FeatureRow {
            entities,
            features,
            timestamp: Some(timestamp),
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn group(name: &str, features: &[&str]) -> FeatureGroup {
        let now = Utc::now();
        FeatureGroup {
            name: name.to_string(),
            description: String::new(),
            features: features.iter().map(|f| f.to_string()).collect(),
            timestamp_column: "ts".to_string(),
            entity_columns: vec!["host_id".to_string()],
            version: 1,
            tags: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 12, minute, 0).unwrap()
    }

    fn rec(host: &str, at: DateTime<Utc>, feature: &str, value: f64) -> OfflineRecord {
        let mut features = HashMap::new();
        features.insert(feature.to_string(), FeatureValue::Float(value));
        let mut entities = HashMap::new();
        entities.insert(
            "host_id".to_string(),
            FeatureValue::String(host.to_string()),
        );
        OfflineRecord {
            entity_key: host.to_string(),
            entities,
            timestamp: at,
            features,
        }
    }

    fn requested(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_single_group_passthrough() {
        let slices = vec![(
            group("server_metrics", &["cpu"]),
            vec![rec("h1", ts(0), "cpu", 50.0), rec("h1", ts(5), "cpu", 70.0)],
        )];

        let rows = as_of_join(&requested(&["cpu"]), &["host_id".to_string()], &slices);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, Some(ts(0)));
        assert_eq!(rows[0].features.get("cpu"), Some(&FeatureValue::Float(50.0)));
        assert_eq!(rows[1].features.get("cpu"), Some(&FeatureValue::Float(70.0)));
        assert_eq!(
            rows[0].entities.get("host_id"),
            Some(&FeatureValue::String("h1".into()))
        );
    }

    #[test]
    fn test_as_of_fills_latest_value_at_or_before() {
        let slices = vec![
            (
                group("metrics", &["cpu"]),
                vec![rec("h1", ts(0), "cpu", 50.0), rec("h1", ts(10), "cpu", 90.0)],
            ),
            (
                group("labels", &["anomaly_score"]),
                vec![rec("h1", ts(5), "anomaly_score", 0.7)],
            ),
        ];

        let rows = as_of_join(
            &requested(&["cpu", "anomaly_score"]),
            &["host_id".to_string()],
            &slices,
        );
        // Spine: t0, t5, t10
        assert_eq!(rows.len(), 3);

        // t0: labels has nothing yet, no leakage from t5
        assert_eq!(rows[0].features.get("cpu"), Some(&FeatureValue::Float(50.0)));
        assert_eq!(rows[0].features.get("anomaly_score"), Some(&FeatureValue::Null));

        // t5: cpu carried forward from t0, score exact
        assert_eq!(rows[1].features.get("cpu"), Some(&FeatureValue::Float(50.0)));
        assert_eq!(
            rows[1].features.get("anomaly_score"),
            Some(&FeatureValue::Float(0.7))
        );

        // t10: both filled, score carried forward
        assert_eq!(rows[2].features.get("cpu"), Some(&FeatureValue::Float(90.0)));
        assert_eq!(
            rows[2].features.get("anomaly_score"),
            Some(&FeatureValue::Float(0.7))
        );
    }

    #[test]
    fn test_entities_joined_independently() {
        let slices = vec![(
            group("metrics", &["cpu"]),
            vec![rec("h1", ts(0), "cpu", 1.0), rec("h2", ts(0), "cpu", 2.0)],
        )];

        let rows = as_of_join(&requested(&["cpu"]), &["host_id".to_string()], &slices);
        assert_eq!(rows.len(), 2);
        // Ordered by (entity_key, timestamp)
        assert_eq!(rows[0].features.get("cpu"), Some(&FeatureValue::Float(1.0)));
        assert_eq!(rows[1].features.get("cpu"), Some(&FeatureValue::Float(2.0)));
    }

    #[test]
    fn test_duplicate_instants_collapse_to_one_spine_point() {
        let slices = vec![
            (group("a", &["x"]), vec![rec("h1", ts(3), "x", 1.0)]),
            (group("b", &["y"]), vec![rec("h1", ts(3), "y", 2.0)]),
        ];

        let rows = as_of_join(&requested(&["x", "y"]), &["host_id".to_string()], &slices);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].features.get("x"), Some(&FeatureValue::Float(1.0)));
        assert_eq!(rows[0].features.get("y"), Some(&FeatureValue::Float(2.0)));
    }

    #[test]
    fn test_empty_slices_yield_no_rows() {
        let slices = vec![(group("a", &["x"]), vec![])];
        assert!(as_of_join(&requested(&["x"]), &["host_id".to_string()], &slices).is_empty());
    }
}
