//! # FeatherStore
//!
//! An embedded feature store with a dual storage path:
//!
//! - **Offline store**: durable, append-only feature history for training-set
//!   assembly (point-in-time correct reads)
//! - **Online store**: TTL-bounded cache of the latest feature values per
//!   entity for low-latency inference reads
//!
//! This crate is the orchestration layer. It wires the metadata catalog, the
//! store adapters and the validation/statistics machinery from the component
//! crates into one [`FeatureStore`] handle:
//!
//! - [`write_features`](FeatureStore::write_features): validate a batch, land
//!   it offline, refresh the online cache, snapshot statistics
//! - [`get_online_features`](FeatureStore::get_online_features): serve the
//!   latest values for a feature view
//! - [`get_historical_features`](FeatureStore::get_historical_features):
//!   point-in-time correct training reads over a time window
//! - lifecycle: create/evolve/delete feature groups and views with their
//!   dependent storage
//!
//! ## Quick start
//!
//! ```rust,ignore
//! let store = FeatureStore::in_memory().await?;
//! store.create_feature_group(spec).await?;
//! store.write_features("server_metrics", batch, WriteOptions::default()).await?;
//! let rows = store.get_online_features("server_view", &entity_rows).await?;
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod historical;
mod lifecycle;
mod online_read;
mod point_in_time;
mod write;

pub use config::StoreConfig;
pub use featherstore_core::{
    Error, FeatureGroup, FeatureRow, FeatureStatistics, FeatureValue, FeatureView, OfflineStore,
    OnlineStore, Record, Result,
};
pub use featherstore_offline::SqliteOfflineStore;
pub use featherstore_online::MemoryOnlineStore;
#[cfg(feature = "redis")]
pub use featherstore_online::{RedisConfig, RedisOnlineStore};
pub use featherstore_registry::{CatalogConfig, FeatureCatalog, FeatureGroupSpec, FeatureViewSpec};
pub use write::{WriteOptions, WriteSummary};

/// The feature store handle
///
/// Cheap to share behind an `Arc`; all methods take `&self` and the backing
/// stores are thread-safe.
pub struct FeatureStore {
    catalog: FeatureCatalog,
    offline: Arc<dyn OfflineStore>,
    online: Arc<dyn OnlineStore>,
    config: StoreConfig,
}

impl FeatureStore {
    /// Wire a store from explicit components
    pub fn new(
        catalog: FeatureCatalog,
        offline: Arc<dyn OfflineStore>,
        online: Arc<dyn OnlineStore>,
        config: StoreConfig,
    ) -> Self {
        Self {
            catalog,
            offline,
            online,
            config,
        }
    }

    /// Fully in-memory store (for testing and experimentation)
    ///
    /// Nothing survives the process: SQLite in-memory catalog and offline
    /// store, in-memory online store.
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(
            FeatureCatalog::in_memory().await?,
            Arc::new(SqliteOfflineStore::in_memory()?),
            Arc::new(MemoryOnlineStore::new()),
            StoreConfig::default(),
        ))
    }

    /// Embedded single-node store rooted at a directory
    ///
    /// Catalog and offline history are SQLite files under `dir`; the online
    /// store is in-memory (latest values are rebuilt by subsequent writes).
    pub async fn embedded<P: AsRef<Path>>(dir: P, config: StoreConfig) -> Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::store_unavailable(format!("creating {}: {e}", dir.display())))?;

        let catalog_path = dir.join("catalog.db");
        let offline_path = dir.join("features.db");

        Ok(Self::new(
            FeatureCatalog::new(CatalogConfig::sqlite(catalog_path.to_string_lossy())).await?,
            Arc::new(SqliteOfflineStore::new(&offline_path)?),
            Arc::new(MemoryOnlineStore::new()),
            config,
        ))
    }

    /// The metadata catalog
    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    /// Readiness of both backing stores
    pub async fn health_check(&self) -> Result<()> {
        with_timeout(
            self.config.offline_timeout(),
            "offline health check",
            self.offline.health_check(),
        )
        .await?;
        with_timeout(
            self.config.online_timeout(),
            "online health check",
            self.online.health_check(),
        )
        .await
    }

    pub(crate) fn offline(&self) -> &dyn OfflineStore {
        self.offline.as_ref()
    }

    pub(crate) fn online(&self) -> &dyn OnlineStore {
        self.online.as_ref()
    }

    pub(crate) fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Bounds a store operation; elapsed limits surface as `StoreUnavailable`
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::store_unavailable(format!(
            "{what} timed out after {}s",
            limit.as_secs()
        ))),
    }
}
