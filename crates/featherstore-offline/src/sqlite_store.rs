//! SQLite offline store with WAL mode
//!
//! ## Table layout
//!
//! Per feature group `g`, a table `fg_{g}`:
//!
//! ```text
//! id          INTEGER PRIMARY KEY   -- append order
//! entity_key  TEXT                  -- entity values joined by ':'
//! entities    TEXT (JSON)           -- entity column name -> value
//! event_ts    BIGINT                -- epoch microseconds
//! features    TEXT (JSON)           -- feature name -> typed value
//! ```
//!
//! Rows are append-only and indexed on `(entity_key, event_ts)`; range reads
//! return rows ordered by that pair so the read path can tolerate
//! out-of-order arrival on the write side. A shared `feature_statistics`
//! table holds the per-batch snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use featherstore_core::{
    recover_mutex, Error, FeatureStatistics, OfflineRecord, OfflineStore, Result,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Rows per insert transaction when appending large batches
const DEFAULT_CHUNK_SIZE: usize = 500;

/// Embedded durable feature store
pub struct SqliteOfflineStore {
    db: Arc<Mutex<Connection>>,
    chunk_size: usize,
}

impl SqliteOfflineStore {
    /// Open or create the offline database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:" || path_str.starts_with("file::memory:");

        let db = Connection::open_with_flags(
            path.as_ref(),
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .map_err(|e| Error::store_unavailable(format!("failed to open offline store: {e}")))?;

        if !is_memory {
            db.pragma_update(None, "journal_mode", "WAL")
                .map_err(db_err)?;
            db.pragma_update(None, "busy_timeout", 5000).map_err(db_err)?;
            db.pragma_update(None, "synchronous", "NORMAL")
                .map_err(db_err)?;
            info!("Initialized SQLite offline store at {:?} with WAL mode", path.as_ref());
        } else {
            info!("Initialized in-memory SQLite offline store (testing mode)");
        }

        create_statistics_table(&db)?;

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    /// Override the append chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

/// Guards table-name construction: group names are catalog-validated
/// identifiers, but the offline store never trusts that alone.
fn table_name(feature_group: &str) -> Result<String> {
    let mut chars = feature_group.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(format!("fg_{feature_group}"))
    } else {
        Err(Error::validation(format!(
            "invalid feature group name '{feature_group}'"
        )))
    }
}

fn create_statistics_table(db: &Connection) -> Result<()> {
    db.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS feature_statistics (
            id INTEGER PRIMARY KEY,
            feature_group TEXT NOT NULL,
            feature_name TEXT NOT NULL,
            computed_at BIGINT NOT NULL,
            count BIGINT NOT NULL,
            null_count BIGINT NOT NULL,
            unique_count BIGINT NOT NULL,
            mean REAL NOT NULL,
            std REAL NOT NULL,
            min REAL NOT NULL,
            max REAL NOT NULL,
            p25 REAL NOT NULL,
            p50 REAL NOT NULL,
            p75 REAL NOT NULL,
            p90 REAL NOT NULL,
            p95 REAL NOT NULL,
            p99 REAL NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_stats_group_feature_time
            ON feature_statistics(feature_group, feature_name, computed_at DESC);
        "#,
    )
    .map_err(db_err)
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::store_unavailable(format!("offline store: {e}"))
}

fn decode_record(
    entity_key: String,
    entities_json: String,
    event_ts: i64,
    features_json: String,
) -> Result<OfflineRecord> {
    Ok(OfflineRecord {
        entity_key,
        entities: serde_json::from_str(&entities_json)?,
        timestamp: DateTime::from_timestamp_micros(event_ts)
            .ok_or_else(|| Error::internal(format!("stored timestamp out of range: {event_ts}")))?,
        features: serde_json::from_str(&features_json)?,
    })
}

#[async_trait]
impl OfflineStore for SqliteOfflineStore {
    async fn create_table(&self, feature_group: &str) -> Result<()> {
        let table = table_name(feature_group)?;
        let db = recover_mutex(&self.db, "OfflineStore")?;

        db.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY,
                entity_key TEXT NOT NULL,
                entities TEXT NOT NULL,
                event_ts BIGINT NOT NULL,
                features TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_entity_ts ON {table}(entity_key, event_ts);
            "#
        ))
        .map_err(db_err)?;

        debug!(feature_group = feature_group, "Created offline table");
        Ok(())
    }

    async fn drop_table(&self, feature_group: &str) -> Result<()> {
        let table = table_name(feature_group)?;
        let db = recover_mutex(&self.db, "OfflineStore")?;
        db.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
            .map_err(db_err)?;
        info!(feature_group = feature_group, "Dropped offline table");
        Ok(())
    }

    async fn append(&self, feature_group: &str, records: Vec<OfflineRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let table = table_name(feature_group)?;
        let mut db = recover_mutex(&self.db, "OfflineStore")?;
        let total = records.len();

        for chunk in records.chunks(self.chunk_size) {
            let tx = db.transaction().map_err(db_err)?;
            {
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO {table} (entity_key, entities, event_ts, features) \
                         VALUES (?, ?, ?, ?)"
                    ))
                    .map_err(db_err)?;
                for record in chunk {
                    stmt.execute(params![
                        &record.entity_key,
                        serde_json::to_string(&record.entities)?,
                        record.timestamp.timestamp_micros(),
                        serde_json::to_string(&record.features)?,
                    ])
                    .map_err(db_err)?;
                }
            }
            tx.commit().map_err(db_err)?;
        }

        debug!(
            feature_group = feature_group,
            rows = total,
            "Appended batch to offline store"
        );
        Ok(total)
    }

    async fn range_query(
        &self,
        feature_group: &str,
        entity_keys: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OfflineRecord>> {
        let table = table_name(feature_group)?;
        let db = recover_mutex(&self.db, "OfflineStore")?;

        let mut sql = format!(
            "SELECT entity_key, entities, event_ts, features FROM {table} \
             WHERE event_ts BETWEEN ? AND ?"
        );
        let mut args: Vec<Value> = vec![
            Value::Integer(start.timestamp_micros()),
            Value::Integer(end.timestamp_micros()),
        ];
        if !entity_keys.is_empty() {
            let placeholders = vec!["?"; entity_keys.len()].join(", ");
            sql.push_str(&format!(" AND entity_key IN ({placeholders})"));
            args.extend(entity_keys.iter().map(|k| Value::Text(k.clone())));
        }
        sql.push_str(" ORDER BY entity_key, event_ts, id");

        let mut stmt = db.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(args), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(db_err)?;

        let mut records = Vec::new();
        for row in rows {
            let (entity_key, entities_json, event_ts, features_json) = row.map_err(db_err)?;
            records.push(decode_record(entity_key, entities_json, event_ts, features_json)?);
        }
        Ok(records)
    }

    async fn save_statistics(&self, snapshots: &[FeatureStatistics]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }
        let mut db = recover_mutex(&self.db, "OfflineStore")?;
        let tx = db.transaction().map_err(db_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO feature_statistics (
                        feature_group, feature_name, computed_at,
                        count, null_count, unique_count,
                        mean, std, min, max, p25, p50, p75, p90, p95, p99
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(db_err)?;
            for s in snapshots {
                stmt.execute(params![
                    &s.feature_group,
                    &s.feature_name,
                    s.computed_at.timestamp_micros(),
                    s.count,
                    s.null_count,
                    s.unique_count,
                    s.mean,
                    s.std,
                    s.min,
                    s.max,
                    s.p25,
                    s.p50,
                    s.p75,
                    s.p90,
                    s.p95,
                    s.p99,
                ])
                .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    async fn get_statistics(
        &self,
        feature_group: &str,
        feature_name: &str,
    ) -> Result<Vec<FeatureStatistics>> {
        let db = recover_mutex(&self.db, "OfflineStore")?;
        let mut stmt = db
            .prepare(
                "SELECT feature_group, feature_name, computed_at, count, null_count, \
                 unique_count, mean, std, min, max, p25, p50, p75, p90, p95, p99 \
                 FROM feature_statistics \
                 WHERE feature_group = ? AND feature_name = ? \
                 ORDER BY computed_at DESC, id DESC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![feature_group, feature_name], |row| {
                let computed_at: i64 = row.get(2)?;
                Ok(FeatureStatistics {
                    feature_group: row.get(0)?,
                    feature_name: row.get(1)?,
                    computed_at: DateTime::from_timestamp_micros(computed_at).unwrap_or_default(),
                    count: row.get(3)?,
                    null_count: row.get(4)?,
                    unique_count: row.get(5)?,
                    mean: row.get(6)?,
                    std: row.get(7)?,
                    min: row.get(8)?,
                    max: row.get(9)?,
                    p25: row.get(10)?,
                    p50: row.get(11)?,
                    p75: row.get(12)?,
                    p90: row.get(13)?,
                    p95: row.get(14)?,
                    p99: row.get(15)?,
                })
            })
            .map_err(db_err)?;

        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row.map_err(db_err)?);
        }
        Ok(snapshots)
    }

    async fn health_check(&self) -> Result<()> {
        let db = recover_mutex(&self.db, "OfflineStore")?;
        db.query_row("SELECT 1", [], |_| Ok(())).map_err(db_err)
    }

    fn store_type(&self) -> &'static str {
        "sqlite"
    }
}
