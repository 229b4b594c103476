//! Online read path: latest feature values for a feature view
//!
//! Resolves the view, fans out one batched read per referenced feature group,
//! and merges the results per requested entity. A miss in the online store
//! (never written, TTL expired, evicted) is not an error: the affected
//! features come back as `Null` and the caller decides how to fall back.

use crate::{with_timeout, FeatureStore};
use featherstore_core::{
    build_online_key, Error, FeatureGroup, FeatureRow, FeatureValue, OnlineEntry, Record, Result,
};
use std::collections::HashMap;

impl FeatureStore {
    /// Read the latest feature values for a view, one result row per entity
    ///
    /// `entities` is columnar: entity column name to a list of values, all
    /// lists the same length; position `i` across the lists identifies one
    /// entity. Every entity column of every group the view references must be
    /// present with non-null values; anything less is a `Query` error before
    /// any store is touched. Result rows come back in input order.
    pub async fn get_online_features(
        &self,
        feature_view: &str,
        entities: &HashMap<String, Vec<FeatureValue>>,
    ) -> Result<Vec<FeatureRow>> {
        let view = self.catalog().get_feature_view(feature_view).await?;

        let entity_rows = entity_rows_from_columns(entities)?;
        if entity_rows.is_empty() {
            return Ok(vec![]);
        }

        let mut groups = Vec::with_capacity(view.feature_groups.len());
        for group_name in &view.feature_groups {
            groups.push(self.catalog().get_feature_group(group_name).await?);
        }

        // Keys for every row are built up front so a malformed request cannot
        // fail halfway through the fan-out
        let mut per_group_entries: Vec<(FeatureGroup, Vec<Option<OnlineEntry>>)> =
            Vec::with_capacity(groups.len());
        for group in groups {
            let keys: Vec<String> = entity_rows
                .iter()
                .map(|row| {
                    Ok(build_online_key(
                        &group.name,
                        &entity_key_for_group(&group, row)?,
                    ))
                })
                .collect::<Result<_>>()?;

            let entries = with_timeout(
                self.config().online_timeout(),
                "online read",
                self.online().get_entries(&keys),
            )
            .await?;
            per_group_entries.push((group, entries));
        }

        let mut rows = Vec::with_capacity(entity_rows.len());
        for (i, entity_row) in entity_rows.iter().enumerate() {
            let mut features: HashMap<String, FeatureValue> = view
                .features
                .iter()
                .map(|f| (f.clone(), FeatureValue::Null))
                .collect();
            let mut timestamp = None;

            for (group, entries) in &per_group_entries {
                let Some(entry) = &entries[i] else { continue };
                for feature in &view.features {
                    if !group.features.contains(feature) {
                        continue;
                    }
                    if let Some(value) = entry.features.get(feature) {
                        features.insert(feature.clone(), value.clone());
                    }
                }
                // Most recent contributing write, when several groups hit
                if timestamp.map_or(true, |ts| entry.timestamp > ts) {
                    timestamp = Some(entry.timestamp);
                }
            }

            let entities: HashMap<String, FeatureValue> = view
                .entities
                .iter()
                .filter_map(|column| {
                    entity_row
                        .get(column)
                        .map(|value| (column.clone(), value.clone()))
                })
                .collect();

            rows.push(FeatureRow {
                entities,
                features,
                timestamp,
            });
        }

        Ok(rows)
    }
}

/// Turns a columnar entity request into per-entity rows
///
/// All value lists must have the same length; position `i` across the columns
/// is one entity.
fn entity_rows_from_columns(
    entities: &HashMap<String, Vec<FeatureValue>>,
) -> Result<Vec<Record>> {
    let mut len: Option<usize> = None;
    for (column, values) in entities {
        match len {
            None => len = Some(values.len()),
            Some(n) if n == values.len() => {}
            Some(n) => {
                return Err(Error::query(format!(
                    "entity column '{column}' has {} values, other columns have {n}",
                    values.len()
                )))
            }
        }
    }

    let n = len.unwrap_or(0);
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        rows.push(
            entities
                .iter()
                .map(|(column, values)| (column.clone(), values[i].clone()))
                .collect(),
        );
    }
    Ok(rows)
}

/// Entity key for a read request row, in the group's declared column order
///
/// Read-path twin of the write-path key builder; malformed requests are
/// `Query` errors rather than validation failures.
pub(crate) fn entity_key_for_group(group: &FeatureGroup, row: &Record) -> Result<String> {
    let mut parts = Vec::with_capacity(group.entity_columns.len());
    for column in &group.entity_columns {
        let part = row
            .get(column)
            .and_then(|v| v.as_key_part())
            .ok_or_else(|| {
                Error::query(format!(
                    "entity column '{column}' of group '{}' missing or null in request",
                    group.name
                ))
            })?;
        parts.push(part);
    }
    Ok(parts.join(":"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn test_group(entity_columns: &[&str]) -> FeatureGroup {
        let now = Utc::now();
        FeatureGroup {
            name: "server_metrics".to_string(),
            description: String::new(),
            features: vec!["cpu".to_string()],
            timestamp_column: "ts".to_string(),
            entity_columns: entity_columns.iter().map(|c| c.to_string()).collect(),
            version: 1,
            tags: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_request_key_ordering() {
        let group = test_group(&["region", "host_id"]);
        let mut row = Record::new();
        row.insert("host_id".to_string(), FeatureValue::String("h1".into()));
        row.insert("region".to_string(), FeatureValue::String("eu".into()));
        assert_eq!(entity_key_for_group(&group, &row).unwrap(), "eu:h1");
    }

    #[test]
    fn test_columnar_request_rowized_in_order() {
        let mut entities = HashMap::new();
        entities.insert(
            "host_id".to_string(),
            vec![
                FeatureValue::String("h1".into()),
                FeatureValue::String("h2".into()),
            ],
        );
        let rows = entity_rows_from_columns(&entities).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1].get("host_id"),
            Some(&FeatureValue::String("h2".into()))
        );
    }

    #[test]
    fn test_ragged_columns_are_query_error() {
        let mut entities = HashMap::new();
        entities.insert("host_id".to_string(), vec![FeatureValue::String("h1".into())]);
        entities.insert(
            "region".to_string(),
            vec![
                FeatureValue::String("eu".into()),
                FeatureValue::String("us".into()),
            ],
        );
        let err = entity_rows_from_columns(&entities).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }

    #[test]
    fn test_missing_entity_is_query_error() {
        let group = test_group(&["host_id"]);
        let err = entity_key_for_group(&group, &Record::new()).unwrap_err();
        assert!(matches!(err, Error::Query(_)));

        let mut row = Record::new();
        row.insert("host_id".to_string(), FeatureValue::Null);
        let err = entity_key_for_group(&group, &row).unwrap_err();
        assert!(matches!(err, Error::Query(_)));
    }
}
