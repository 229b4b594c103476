//! Schema validation for write batches
//!
//! Every batch is checked against its target feature group before any storage
//! is touched:
//!
//! - the timestamp column must be present and timestamp-typed in every record
//! - every entity column must be present and non-null in every record
//! - columns that are neither entity, timestamp, nor declared features fail
//!   validation (undeclared columns would silently widen the schema; evolution
//!   is explicit and additive via the catalog)
//! - declared features absent from the batch produce warnings, not errors
//!   (sparse writes are allowed)
//!
//! Validation fails with a single error listing every violation found, not
//! just the first.

use crate::types::{FeatureGroup, Record};
use crate::{Error, FeatureValue, Result};
use std::collections::BTreeSet;

/// Outcome of a successful validation
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Non-fatal findings, e.g. declared features absent from the batch
    pub warnings: Vec<String>,
}

/// Validates a batch against a feature group's declared schema
pub fn validate_batch(group: &FeatureGroup, batch: &[Record]) -> Result<ValidationReport> {
    if batch.is_empty() {
        return Err(Error::validation("batch is empty"));
    }

    // BTreeSets keep the error message deterministic
    let mut missing_timestamp = BTreeSet::new();
    let mut bad_timestamp = BTreeSet::new();
    let mut missing_entities = BTreeSet::new();
    let mut undeclared = BTreeSet::new();
    let mut seen_features = BTreeSet::new();

    for record in batch {
        match record.get(&group.timestamp_column) {
            None => {
                missing_timestamp.insert(group.timestamp_column.clone());
            }
            Some(FeatureValue::Timestamp(_)) | Some(FeatureValue::Int(_)) => {}
            Some(other) => {
                bad_timestamp.insert(format!(
                    "'{}' has type {}",
                    group.timestamp_column,
                    other.type_name()
                ));
            }
        }

        for column in &group.entity_columns {
            match record.get(column) {
                Some(v) if !v.is_null() => {}
                _ => {
                    missing_entities.insert(column.clone());
                }
            }
        }

        for column in record.keys() {
            if column == &group.timestamp_column || group.entity_columns.contains(column) {
                continue;
            }
            if group.features.iter().any(|f| f == column) {
                seen_features.insert(column.clone());
            } else {
                undeclared.insert(column.clone());
            }
        }
    }

    let mut violations = Vec::new();
    if !missing_timestamp.is_empty() {
        violations.push(format!(
            "missing timestamp column: {}",
            join(&missing_timestamp)
        ));
    }
    if !bad_timestamp.is_empty() {
        violations.push(format!("invalid timestamp values: {}", join(&bad_timestamp)));
    }
    if !missing_entities.is_empty() {
        violations.push(format!(
            "missing or null entity columns: {}",
            join(&missing_entities)
        ));
    }
    if !undeclared.is_empty() {
        violations.push(format!(
            "undeclared feature columns: {} (schema evolution is additive and explicit)",
            join(&undeclared)
        ));
    }

    if !violations.is_empty() {
        return Err(Error::Validation(violations.join("; ")));
    }

    let mut report = ValidationReport::default();
    for feature in &group.features {
        if !seen_features.contains(feature) {
            report
                .warnings
                .push(format!("declared feature '{feature}' absent from batch"));
        }
    }
    Ok(report)
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().cloned().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn test_group() -> FeatureGroup {
        let now = Utc::now();
        FeatureGroup {
            name: "server_metrics".to_string(),
            description: String::new(),
            features: vec!["cpu".to_string(), "mem".to_string()],
            timestamp_column: "ts".to_string(),
            entity_columns: vec!["host_id".to_string()],
            version: 1,
            tags: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn valid_record() -> Record {
        let mut record = Record::new();
        record.insert("host_id".to_string(), FeatureValue::String("h1".into()));
        record.insert("ts".to_string(), FeatureValue::Timestamp(Utc::now()));
        record.insert("cpu".to_string(), FeatureValue::Float(50.0));
        record.insert("mem".to_string(), FeatureValue::Int(60));
        record
    }

    #[test]
    fn test_valid_batch_passes() {
        let report = validate_batch(&test_group(), &[valid_record()]).unwrap();
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_batch_fails() {
        assert!(validate_batch(&test_group(), &[]).is_err());
    }

    #[test]
    fn test_sparse_batch_warns_but_passes() {
        let mut record = valid_record();
        record.remove("mem");
        let report = validate_batch(&test_group(), &[record]).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("mem"));
    }

    #[test]
    fn test_error_lists_every_missing_column() {
        let mut group = test_group();
        group.entity_columns = vec!["host_id".to_string(), "region".to_string()];

        let mut record = Record::new();
        record.insert("cpu".to_string(), FeatureValue::Float(1.0));
        let err = validate_batch(&group, &[record]).unwrap_err();
        let msg = err.to_string();
        // All three required columns named in one error
        assert!(msg.contains("ts"));
        assert!(msg.contains("host_id"));
        assert!(msg.contains("region"));
    }

    #[test]
    fn test_null_entity_column_fails() {
        let mut record = valid_record();
        record.insert("host_id".to_string(), FeatureValue::Null);
        assert!(validate_batch(&test_group(), &[record]).is_err());
    }

    #[test]
    fn test_non_timestamp_value_fails() {
        let mut record = valid_record();
        record.insert("ts".to_string(), FeatureValue::String("noon".into()));
        let err = validate_batch(&test_group(), &[record]).unwrap_err();
        assert!(err.to_string().contains("invalid timestamp"));
    }

    #[test]
    fn test_undeclared_feature_fails() {
        let mut record = valid_record();
        record.insert("disk".to_string(), FeatureValue::Float(3.0));
        let err = validate_batch(&test_group(), &[record]).unwrap_err();
        assert!(err.to_string().contains("disk"));
    }

    #[test]
    fn test_violation_in_any_record_fails_batch() {
        let mut bad = valid_record();
        bad.remove("host_id");
        let err = validate_batch(&test_group(), &[valid_record(), bad]).unwrap_err();
        assert!(err.to_string().contains("host_id"));
    }
}
