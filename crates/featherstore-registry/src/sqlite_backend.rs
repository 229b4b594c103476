//! SQLite catalog backend with WAL mode
//!
//! Suitable for embedded deployments and testing. WAL mode keeps concurrent
//! readers from blocking the single writer; the busy timeout waits for locks
//! instead of failing immediately.

use crate::backend::CatalogBackend;
use crate::schema;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use featherstore_core::{recover_mutex, FeatureGroup, FeatureView};
use rusqlite::{params, Connection, OpenFlags, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite backend for catalog metadata
pub struct SqliteCatalogBackend {
    db: Arc<Mutex<Connection>>,
}

impl SqliteCatalogBackend {
    /// Create a new backend from a file path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:" || path_str.starts_with("file::memory:");

        let db = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .context("Failed to open SQLite connection for catalog")?;

        // WAL only applies to file-backed databases
        if !is_memory {
            db.pragma_update(None, "journal_mode", "WAL")
                .context("Failed to enable WAL mode")?;
            db.pragma_update(None, "busy_timeout", 5000)
                .context("Failed to set busy timeout")?;
            db.pragma_update(None, "synchronous", "NORMAL")
                .context("Failed to set synchronous mode")?;

            info!("Initialized SQLite catalog at {:?} with WAL mode", path.as_ref());
        } else {
            info!("Initialized in-memory SQLite catalog (testing mode)");
        }

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Create an in-memory backend (for testing)
    pub fn in_memory() -> Result<Self> {
        let db =
            Connection::open_in_memory().context("Failed to create in-memory SQLite catalog")?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<FeatureGroup> {
    let features_json: String = row.get(2)?;
    let entity_columns_json: String = row.get(4)?;
    let tags_json: String = row.get(6)?;
    let created_at: i64 = row.get(7)?;
    let updated_at: i64 = row.get(8)?;

    Ok(FeatureGroup {
        name: row.get(0)?,
        description: row.get(1)?,
        features: serde_json::from_str(&features_json).map_err(|e| json_err(2, e))?,
        timestamp_column: row.get(3)?,
        entity_columns: serde_json::from_str(&entity_columns_json).map_err(|e| json_err(4, e))?,
        version: row.get(5)?,
        tags: serde_json::from_str(&tags_json).map_err(|e| json_err(6, e))?,
        created_at: DateTime::from_timestamp_micros(created_at).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_micros(updated_at).unwrap_or_default(),
    })
}

fn view_from_row(row: &Row<'_>) -> rusqlite::Result<FeatureView> {
    let feature_groups_json: String = row.get(1)?;
    let features_json: String = row.get(2)?;
    let entities_json: String = row.get(3)?;
    let created_at: i64 = row.get(6)?;
    let updated_at: i64 = row.get(7)?;

    Ok(FeatureView {
        name: row.get(0)?,
        feature_groups: serde_json::from_str(&feature_groups_json).map_err(|e| json_err(1, e))?,
        features: serde_json::from_str(&features_json).map_err(|e| json_err(2, e))?,
        entities: serde_json::from_str(&entities_json).map_err(|e| json_err(3, e))?,
        ttl_seconds: row.get(4)?,
        version: row.get(5)?,
        created_at: DateTime::from_timestamp_micros(created_at).unwrap_or_default(),
        updated_at: DateTime::from_timestamp_micros(updated_at).unwrap_or_default(),
    })
}

fn json_err(column: usize, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

#[async_trait]
impl CatalogBackend for SqliteCatalogBackend {
    async fn init_schema(&self) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;
        schema::create_tables(&db)?;
        Ok(())
    }

    async fn upsert_feature_group(&self, group: &FeatureGroup) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;

        db.execute(
            r#"
            INSERT OR REPLACE INTO feature_groups (
                name, description, features, timestamp_column, entity_columns,
                version, tags, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                &group.name,
                &group.description,
                serde_json::to_string(&group.features)?,
                &group.timestamp_column,
                serde_json::to_string(&group.entity_columns)?,
                group.version,
                serde_json::to_string(&group.tags)?,
                group.created_at.timestamp_micros(),
                group.updated_at.timestamp_micros(),
            ],
        )
        .context("Failed to upsert feature group")?;

        debug!("Stored feature group: {}", group.name);
        Ok(())
    }

    async fn get_feature_group(&self, name: &str) -> Result<Option<FeatureGroup>> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;

        let mut stmt = db.prepare(
            "SELECT name, description, features, timestamp_column, entity_columns, \
             version, tags, created_at, updated_at FROM feature_groups WHERE name = ?",
        )?;
        let mut rows = stmt.query_map(params![name], group_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to decode feature group row")?)),
            None => Ok(None),
        }
    }

    async fn list_feature_groups(&self) -> Result<Vec<FeatureGroup>> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;

        let mut stmt = db.prepare(
            "SELECT name, description, features, timestamp_column, entity_columns, \
             version, tags, created_at, updated_at FROM feature_groups ORDER BY name",
        )?;
        let rows = stmt.query_map([], group_from_row)?;
        let mut groups = Vec::new();
        for row in rows {
            groups.push(row.context("Failed to decode feature group row")?);
        }
        Ok(groups)
    }

    async fn delete_feature_group(&self, name: &str) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;
        db.execute("DELETE FROM feature_groups WHERE name = ?", params![name])
            .context("Failed to delete feature group")?;
        debug!("Deleted feature group metadata: {}", name);
        Ok(())
    }

    async fn upsert_feature_view(&self, view: &FeatureView) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;

        db.execute(
            r#"
            INSERT OR REPLACE INTO feature_views (
                name, feature_groups, features, entities, ttl_seconds,
                version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                &view.name,
                serde_json::to_string(&view.feature_groups)?,
                serde_json::to_string(&view.features)?,
                serde_json::to_string(&view.entities)?,
                view.ttl_seconds,
                view.version,
                view.created_at.timestamp_micros(),
                view.updated_at.timestamp_micros(),
            ],
        )
        .context("Failed to upsert feature view")?;

        debug!("Stored feature view: {}", view.name);
        Ok(())
    }

    async fn get_feature_view(&self, name: &str) -> Result<Option<FeatureView>> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;

        let mut stmt = db.prepare(
            "SELECT name, feature_groups, features, entities, ttl_seconds, \
             version, created_at, updated_at FROM feature_views WHERE name = ?",
        )?;
        let mut rows = stmt.query_map(params![name], view_from_row)?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to decode feature view row")?)),
            None => Ok(None),
        }
    }

    async fn list_feature_views(&self) -> Result<Vec<FeatureView>> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;

        let mut stmt = db.prepare(
            "SELECT name, feature_groups, features, entities, ttl_seconds, \
             version, created_at, updated_at FROM feature_views ORDER BY name",
        )?;
        let rows = stmt.query_map([], view_from_row)?;
        let mut views = Vec::new();
        for row in rows {
            views.push(row.context("Failed to decode feature view row")?);
        }
        Ok(views)
    }

    async fn delete_feature_view(&self, name: &str) -> Result<()> {
        let db = recover_mutex(&self.db, "FeatureCatalog")?;
        db.execute("DELETE FROM feature_views WHERE name = ?", params![name])
            .context("Failed to delete feature view")?;
        debug!("Deleted feature view metadata: {}", name);
        Ok(())
    }
}
