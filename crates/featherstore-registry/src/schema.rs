//! Database schema for the metadata catalog
//!
//! # Tables
//!
//! - **feature_groups**: named, versioned feature group definitions
//! - **feature_views**: read-oriented compositions of feature groups
//!
//! # Design Decisions
//!
//! - JSON columns for list/map attributes (features, entity columns, tags):
//!   simplifies the schema, avoids JOIN complexity
//! - BIGINT timestamps: epoch microseconds for portability

use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn create_tables(db: &Connection) -> Result<()> {
    db.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS feature_groups (
            name TEXT PRIMARY KEY,
            description TEXT NOT NULL,
            features TEXT NOT NULL,
            timestamp_column TEXT NOT NULL,
            entity_columns TEXT NOT NULL,
            version INTEGER NOT NULL,
            tags TEXT NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS feature_views (
            name TEXT PRIMARY KEY,
            feature_groups TEXT NOT NULL,
            features TEXT NOT NULL,
            entities TEXT NOT NULL,
            ttl_seconds BIGINT,
            version INTEGER NOT NULL,
            created_at BIGINT NOT NULL,
            updated_at BIGINT NOT NULL
        );
        "#,
    )
    .context("Failed to create catalog schema")?;

    Ok(())
}
