//! Catalog backend trait and configuration
//!
//! The catalog persists feature group and feature view definitions. The
//! backend is a plain row store; uniqueness checks, reference checks, and
//! caching live in [`crate::FeatureCatalog`] on top of it.

use anyhow::Result;
use async_trait::async_trait;
use featherstore_core::{FeatureGroup, FeatureView};

/// Storage operations for catalog metadata
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Initialize schema (create tables, indexes)
    async fn init_schema(&self) -> Result<()>;

    /// Insert or replace a feature group definition
    async fn upsert_feature_group(&self, group: &FeatureGroup) -> Result<()>;

    /// Get a feature group by name
    async fn get_feature_group(&self, name: &str) -> Result<Option<FeatureGroup>>;

    /// List all feature groups, ordered by name
    async fn list_feature_groups(&self) -> Result<Vec<FeatureGroup>>;

    /// Delete a feature group's metadata row
    async fn delete_feature_group(&self, name: &str) -> Result<()>;

    /// Insert or replace a feature view definition
    async fn upsert_feature_view(&self, view: &FeatureView) -> Result<()>;

    /// Get a feature view by name
    async fn get_feature_view(&self, name: &str) -> Result<Option<FeatureView>>;

    /// List all feature views, ordered by name
    async fn list_feature_views(&self) -> Result<Vec<FeatureView>>;

    /// Delete a feature view's metadata row
    async fn delete_feature_view(&self, name: &str) -> Result<()>;
}

/// Configuration for the catalog backend
#[derive(Debug, Clone)]
pub enum CatalogConfig {
    /// SQLite with WAL mode (embedded, multi-process safe)
    Sqlite {
        /// Path to the SQLite database file, or ":memory:"
        path: String,
    },
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: ".featherstore/catalog.db".to_string(),
        }
    }
}

impl CatalogConfig {
    /// Create a SQLite configuration
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self::Sqlite { path: path.into() }
    }
}
