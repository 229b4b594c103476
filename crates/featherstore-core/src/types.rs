//! Core data types for FeatherStore
//!
//! This module defines the fundamental data structures used throughout the
//! system: typed feature values, record batches on the write path, and the
//! catalog definitions for feature groups and feature views.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Represents a feature value that can be of different types
///
/// Feature values are a tagged union validated against the owning feature
/// group's declared feature list at write time, so type errors surface when a
/// producer writes rather than when a consumer reads.
///
/// ## Serialization
///
/// Uses `#[serde(untagged)]` for cleaner JSON representation:
/// - `Int(42)` → `42`
/// - `String("test")` → `"test"`
/// - `Timestamp(..)` → RFC 3339 string
///
/// Variant order matters for untagged deserialization: `Null` must be first,
/// and `Timestamp` must precede `String` so RFC 3339 strings parse as
/// timestamps instead of plain text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeatureValue {
    /// Null/missing value
    Null,

    /// Boolean value (e.g., is_premium, has_alert)
    Bool(bool),

    /// Integer value (e.g., request counts, age)
    Int(i64),

    /// Floating point value (e.g., cpu utilization, score)
    Float(f64),

    /// Timestamp value (event times, feature computation times)
    Timestamp(DateTime<Utc>),

    /// String value (e.g., category, status)
    String(String),
}

impl FeatureValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FeatureValue::Null)
    }

    /// True for Int and Float values, the inputs to statistics snapshots
    pub fn is_numeric(&self) -> bool {
        matches!(self, FeatureValue::Int(_) | FeatureValue::Float(_))
    }

    /// Numeric value as f64, if this is an Int or Float
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Int(v) => Some(*v as f64),
            FeatureValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Short type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureValue::Null => "null",
            FeatureValue::Bool(_) => "bool",
            FeatureValue::Int(_) => "int",
            FeatureValue::Float(_) => "float",
            FeatureValue::Timestamp(_) => "timestamp",
            FeatureValue::String(_) => "string",
        }
    }

    /// Canonical text form used when the value is part of an entity key
    ///
    /// Returns None for Null: entity columns must never be null.
    pub fn as_key_part(&self) -> Option<String> {
        match self {
            FeatureValue::Null => None,
            FeatureValue::Bool(v) => Some(v.to_string()),
            FeatureValue::Int(v) => Some(v.to_string()),
            FeatureValue::Float(v) => Some(v.to_string()),
            FeatureValue::Timestamp(v) => Some(v.to_rfc3339()),
            FeatureValue::String(v) => Some(v.clone()),
        }
    }
}

impl From<i64> for FeatureValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for FeatureValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for FeatureValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

/// One record on the write path: column name -> value
///
/// A record must contain the owning feature group's timestamp column and every
/// entity column; feature columns are optional (sparse writes are allowed).
pub type Record = HashMap<String, FeatureValue>;

/// Extracts the event timestamp from a record
///
/// Accepts a `Timestamp` value or an `Int` interpreted as epoch milliseconds
/// (the common wire format from stream producers).
pub fn record_timestamp(record: &Record, timestamp_column: &str) -> Result<DateTime<Utc>> {
    match record.get(timestamp_column) {
        Some(FeatureValue::Timestamp(ts)) => Ok(*ts),
        Some(FeatureValue::Int(millis)) => DateTime::from_timestamp_millis(*millis)
            .ok_or_else(|| Error::validation(format!("'{timestamp_column}' out of range: {millis}"))),
        Some(other) => Err(Error::validation(format!(
            "'{timestamp_column}' must be a timestamp, got {}",
            other.type_name()
        ))),
        None => Err(Error::validation(format!(
            "missing timestamp column '{timestamp_column}'"
        ))),
    }
}

/// A named, versioned table-like unit of features
///
/// A feature group owns one append-only offline table and one online key
/// namespace. `entity_columns` and `timestamp_column` are immutable after
/// creation; `features` may grow (schema evolution is additive only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureGroup {
    /// Unique, immutable name (e.g., "server_metrics")
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Ordered declared feature names; grows additively, never repurposed
    pub features: Vec<String>,

    /// Column carrying the event timestamp in every written batch
    pub timestamp_column: String,

    /// Ordered, non-empty entity key columns (e.g., ["host_id"])
    pub entity_columns: Vec<String>,

    /// Monotonic version, bumped on additive schema evolution
    pub version: i32,

    /// Free-form labels (team, owner, tier, ...)
    pub tags: BTreeMap<String, String>,

    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_microseconds")]
    pub updated_at: DateTime<Utc>,
}

impl FeatureGroup {
    /// Deterministic offline table name for this group
    pub fn offline_table(&self) -> String {
        format!("fg_{}", self.name)
    }

    /// Builds the entity key for a record: entity column values joined by ':'
    /// in `entity_columns` order.
    ///
    /// Fails if any entity column is missing or null.
    pub fn entity_key_of(&self, record: &Record) -> Result<String> {
        let mut parts = Vec::with_capacity(self.entity_columns.len());
        for column in &self.entity_columns {
            let part = record
                .get(column)
                .and_then(|v| v.as_key_part())
                .ok_or_else(|| {
                    Error::validation(format!("entity column '{column}' missing or null"))
                })?;
            parts.push(part);
        }
        Ok(parts.join(":"))
    }

    /// Builds the entity key from positional values in `entity_columns` order
    pub fn entity_key_from_values(&self, values: &[FeatureValue]) -> Result<String> {
        if values.len() != self.entity_columns.len() {
            return Err(Error::query(format!(
                "feature group '{}' expects {} entity values, got {}",
                self.name,
                self.entity_columns.len(),
                values.len()
            )));
        }
        let mut parts = Vec::with_capacity(values.len());
        for (column, value) in self.entity_columns.iter().zip(values) {
            let part = value.as_key_part().ok_or_else(|| {
                Error::query(format!("entity column '{column}' must not be null"))
            })?;
            parts.push(part);
        }
        Ok(parts.join(":"))
    }
}

/// A named, read-oriented composition of one or more feature groups
///
/// Feature views are the unit of consumption: the online and historical read
/// paths resolve a view, fan out to its referenced groups, and merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureView {
    /// Unique name (e.g., "server_view")
    pub name: String,

    /// Referenced feature group names; all must exist at creation time
    pub feature_groups: Vec<String>,

    /// Requested features, a subset of the union of the groups' features
    pub features: Vec<String>,

    /// Entity column names, a subset of each referenced group's entity columns
    pub entities: Vec<String>,

    /// Optional TTL for online entries written for this view's groups
    pub ttl_seconds: Option<i64>,

    pub version: i32,

    #[serde(with = "chrono::serde::ts_microseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_microseconds")]
    pub updated_at: DateTime<Utc>,
}

/// One row of a read result
///
/// Carries the entity column values that identify the row, the requested
/// feature values (null for misses), and the event timestamp where one is
/// known (historical reads always have one; online reads report the cached
/// write timestamp when available).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    /// Entity column name -> value
    pub entities: HashMap<String, FeatureValue>,

    /// Feature name -> value; misses are `FeatureValue::Null`
    pub features: HashMap<String, FeatureValue>,

    /// Event timestamp, when known
    pub timestamp: Option<DateTime<Utc>>,
}

impl FeatureRow {
    pub fn get_feature(&self, name: &str) -> Option<&FeatureValue> {
        self.features.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_group() -> FeatureGroup {
        let now = Utc::now();
        FeatureGroup {
            name: "server_metrics".to_string(),
            description: "host-level metrics".to_string(),
            features: vec!["cpu".to_string(), "mem".to_string()],
            timestamp_column: "ts".to_string(),
            entity_columns: vec!["host_id".to_string()],
            version: 1,
            tags: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_feature_value_serialization() {
        // Untagged: serializes to bare JSON values
        assert_eq!(serde_json::to_string(&FeatureValue::Int(42)).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&FeatureValue::Bool(true)).unwrap(),
            "true"
        );
        assert_eq!(serde_json::to_string(&FeatureValue::Null).unwrap(), "null");
    }

    #[test]
    fn test_feature_value_untagged_roundtrip() {
        let values = vec![
            FeatureValue::Null,
            FeatureValue::Bool(false),
            FeatureValue::Int(7),
            FeatureValue::Float(0.25),
            FeatureValue::String("category_a".to_string()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        let back: Vec<FeatureValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(values, back);
    }

    #[test]
    fn test_feature_value_numeric() {
        assert_eq!(FeatureValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FeatureValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(FeatureValue::String("x".into()).as_f64(), None);
        assert!(FeatureValue::Int(1).is_numeric());
        assert!(!FeatureValue::Bool(true).is_numeric());
    }

    #[test]
    fn test_record_timestamp_from_timestamp_value() {
        let ts = Utc::now();
        let mut record = Record::new();
        record.insert("ts".to_string(), FeatureValue::Timestamp(ts));
        assert_eq!(record_timestamp(&record, "ts").unwrap(), ts);
    }

    #[test]
    fn test_record_timestamp_from_epoch_millis() {
        let mut record = Record::new();
        record.insert("ts".to_string(), FeatureValue::Int(1_700_000_000_000));
        let ts = record_timestamp(&record, "ts").unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_record_timestamp_rejects_strings() {
        let mut record = Record::new();
        record.insert("ts".to_string(), FeatureValue::String("yesterday".into()));
        assert!(record_timestamp(&record, "ts").is_err());
        assert!(record_timestamp(&record, "missing").is_err());
    }

    #[test]
    fn test_entity_key_of() {
        let group = test_group();
        let mut record = Record::new();
        record.insert("host_id".to_string(), FeatureValue::String("h1".into()));
        assert_eq!(group.entity_key_of(&record).unwrap(), "h1");
    }

    #[test]
    fn test_entity_key_of_composite() {
        let mut group = test_group();
        group.entity_columns = vec!["region".to_string(), "host_id".to_string()];
        let mut record = Record::new();
        record.insert("host_id".to_string(), FeatureValue::String("h1".into()));
        record.insert("region".to_string(), FeatureValue::String("eu".into()));
        // Joined in entity_columns order, not insertion order
        assert_eq!(group.entity_key_of(&record).unwrap(), "eu:h1");
    }

    #[test]
    fn test_entity_key_rejects_null_and_missing() {
        let group = test_group();
        let mut record = Record::new();
        record.insert("host_id".to_string(), FeatureValue::Null);
        assert!(group.entity_key_of(&record).is_err());
        assert!(group.entity_key_of(&Record::new()).is_err());
    }

    #[test]
    fn test_entity_key_from_values() {
        let group = test_group();
        let key = group
            .entity_key_from_values(&[FeatureValue::String("h9".into())])
            .unwrap();
        assert_eq!(key, "h9");

        // Arity mismatch is a query error
        assert!(group.entity_key_from_values(&[]).is_err());
    }

    #[test]
    fn test_offline_table_name() {
        assert_eq!(test_group().offline_table(), "fg_server_metrics");
    }
}
