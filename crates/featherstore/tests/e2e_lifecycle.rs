//! End-to-end tests for lifecycle, schema evolution and statistics

use chrono::{DateTime, TimeZone, Utc};
use featherstore::{
    Error, FeatureCatalog, FeatureGroupSpec, FeatureStore, FeatureValue, FeatureViewSpec,
    MemoryOnlineStore, Record, SqliteOfflineStore, StoreConfig, WriteOptions,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tempfile::TempDir;

fn server_metrics_spec() -> FeatureGroupSpec {
    FeatureGroupSpec {
        name: "server_metrics".to_string(),
        description: "Host-level utilization metrics".to_string(),
        features: vec!["cpu".to_string(), "mem".to_string()],
        timestamp_column: "ts".to_string(),
        entity_columns: vec!["host_id".to_string()],
        tags: BTreeMap::new(),
    }
}

fn server_view_spec() -> FeatureViewSpec {
    FeatureViewSpec {
        name: "server_view".to_string(),
        feature_groups: vec!["server_metrics".to_string()],
        features: vec!["cpu".to_string()],
        entities: vec!["host_id".to_string()],
        ttl: None,
    }
}

fn record(host: &str, ts: DateTime<Utc>, cpu: f64) -> Record {
    let mut r = Record::new();
    r.insert("host_id".to_string(), FeatureValue::String(host.into()));
    r.insert("ts".to_string(), FeatureValue::Timestamp(ts));
    r.insert("cpu".to_string(), FeatureValue::Float(cpu));
    r
}

fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, minute, 0).unwrap()
}

#[tokio::test]
async fn test_e2e_delete_group_removes_all_derived_state() {
    // Given: a group with data on both paths
    let online = Arc::new(MemoryOnlineStore::new());
    let store = FeatureStore::new(
        FeatureCatalog::in_memory().await.unwrap(),
        Arc::new(SqliteOfflineStore::in_memory().unwrap()),
        online.clone(),
        StoreConfig::default(),
    );
    store.create_feature_group(server_metrics_spec()).await.unwrap();
    store
        .write_features(
            "server_metrics",
            vec![record("h1", ts(0), 50.0), record("h2", ts(0), 30.0)],
            WriteOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(online.keys_with_prefix("features:server_metrics:").len(), 2);

    // When: the group is deleted
    store.delete_feature_group("server_metrics").await.unwrap();

    // Then: metadata, cache and online namespace are all gone
    let err = store
        .catalog()
        .get_feature_group("server_metrics")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FeatureGroupNotFound(_)));
    assert!(online.keys_with_prefix("features:server_metrics:").is_empty());

    // And: the name is immediately reusable
    store.create_feature_group(server_metrics_spec()).await.unwrap();
}

#[tokio::test]
async fn test_e2e_delete_group_blocked_while_view_references_it() {
    let store = FeatureStore::in_memory().await.unwrap();
    store.create_feature_group(server_metrics_spec()).await.unwrap();
    store.create_feature_view(server_view_spec()).await.unwrap();

    let err = store.delete_feature_group("server_metrics").await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("server_view"));

    // The group and its data survive the refused deletion
    store
        .write_features(
            "server_metrics",
            vec![record("h1", ts(0), 50.0)],
            WriteOptions::default(),
        )
        .await
        .unwrap();

    // Dropping the view unblocks it
    store.delete_feature_view("server_view").await.unwrap();
    store.delete_feature_group("server_metrics").await.unwrap();

    // Reads against the deleted view are NotFound, not empty results
    let mut entities = HashMap::new();
    entities.insert(
        "host_id".to_string(),
        vec![FeatureValue::String("h1".into())],
    );
    let err = store
        .get_online_features("server_view", &entities)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FeatureViewNotFound(_)));
}

#[tokio::test]
async fn test_e2e_view_over_missing_group_leaves_no_state() {
    let store = FeatureStore::in_memory().await.unwrap();

    let err = store.create_feature_view(server_view_spec()).await.unwrap_err();
    assert!(matches!(err, Error::FeatureGroupNotFound(_)));

    let err = store
        .catalog()
        .get_feature_view("server_view")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FeatureViewNotFound(_)));
}

#[tokio::test]
async fn test_e2e_write_to_unknown_group_is_not_found() {
    let store = FeatureStore::in_memory().await.unwrap();
    let err = store
        .write_features(
            "never_registered",
            vec![record("h1", ts(0), 1.0)],
            WriteOptions::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FeatureGroupNotFound(_)));
}

#[tokio::test]
async fn test_e2e_schema_evolution_is_additive() {
    // Given: history written against the v1 schema
    let store = FeatureStore::in_memory().await.unwrap();
    store.create_feature_group(server_metrics_spec()).await.unwrap();
    store
        .write_features(
            "server_metrics",
            vec![record("h1", ts(0), 50.0)],
            WriteOptions::default(),
        )
        .await
        .unwrap();

    // When: a feature is added and written
    let group = store
        .add_features("server_metrics", &["disk".to_string()])
        .await
        .unwrap();
    assert_eq!(group.version, 2);

    let mut evolved = record("h1", ts(5), 70.0);
    evolved.insert("disk".to_string(), FeatureValue::Float(0.8));
    store
        .write_features("server_metrics", vec![evolved], WriteOptions::default())
        .await
        .unwrap();

    // Then: a view over the new feature reads old rows as null
    store
        .create_feature_view(FeatureViewSpec {
            name: "disk_view".to_string(),
            feature_groups: vec!["server_metrics".to_string()],
            features: vec!["cpu".to_string(), "disk".to_string()],
            entities: vec!["host_id".to_string()],
            ttl: None,
        })
        .await
        .unwrap();
    let rows = store
        .get_historical_features("disk_view", &[], ts(0), ts(10))
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].features.get("disk"), Some(&FeatureValue::Null));
    assert_eq!(rows[1].features.get("disk"), Some(&FeatureValue::Float(0.8)));
}

#[tokio::test]
async fn test_e2e_statistics_snapshot_per_write() {
    let store = FeatureStore::in_memory().await.unwrap();
    store.create_feature_group(server_metrics_spec()).await.unwrap();

    let batch: Vec<Record> = [10.0, 20.0, 30.0, 40.0]
        .iter()
        .enumerate()
        .map(|(i, cpu)| record(&format!("h{i}"), ts(0), *cpu))
        .collect();
    let summary = store
        .write_features("server_metrics", batch, WriteOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.snapshots, 1); // cpu only, mem absent from the batch

    let snapshots = store.get_statistics("server_metrics", "cpu").await.unwrap();
    assert_eq!(snapshots.len(), 1);
    let s = &snapshots[0];
    assert_eq!(s.count, 4);
    assert!((s.mean - 25.0).abs() < 1e-9);
    assert!((s.std - 125.0f64.sqrt()).abs() < 1e-9);
    assert!((s.p50 - 25.0).abs() < 1e-9);
    assert!((s.p99 - 39.7).abs() < 1e-9);

    // A second write appends a snapshot, newest first
    store
        .write_features(
            "server_metrics",
            vec![record("h0", ts(5), 100.0)],
            WriteOptions::default(),
        )
        .await
        .unwrap();
    let snapshots = store.get_statistics("server_metrics", "cpu").await.unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].count, 1);
    assert_eq!(snapshots[1].count, 4);
}

#[tokio::test]
async fn test_e2e_statistics_for_unknown_group_is_not_found() {
    let store = FeatureStore::in_memory().await.unwrap();
    let err = store.get_statistics("missing", "cpu").await.unwrap_err();
    assert!(matches!(err, Error::FeatureGroupNotFound(_)));
}

#[tokio::test]
async fn test_e2e_embedded_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = FeatureStore::embedded(dir.path(), StoreConfig::default())
            .await
            .unwrap();
        store.create_feature_group(server_metrics_spec()).await.unwrap();
        store.create_feature_view(server_view_spec()).await.unwrap();
        store
            .write_features(
                "server_metrics",
                vec![record("h1", ts(0), 50.0)],
                WriteOptions::default(),
            )
            .await
            .unwrap();
    }

    // A fresh process over the same directory sees catalog and history;
    // the online cache starts cold and repopulates on the next write
    let store = FeatureStore::embedded(dir.path(), StoreConfig::default())
        .await
        .unwrap();
    let group = store.catalog().get_feature_group("server_metrics").await.unwrap();
    assert_eq!(group.features, vec!["cpu", "mem"]);

    let history = store
        .get_historical_features("server_view", &[], ts(0), ts(10))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    let mut entities = HashMap::new();
    entities.insert(
        "host_id".to_string(),
        vec![FeatureValue::String("h1".into())],
    );
    let rows = store
        .get_online_features("server_view", &entities)
        .await
        .unwrap();
    assert_eq!(rows[0].features.get("cpu"), Some(&FeatureValue::Null));
}
