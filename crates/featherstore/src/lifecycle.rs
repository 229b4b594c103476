//! Lifecycle: creating and deleting feature groups and views
//!
//! Creation registers metadata first, then provisions dependent storage;
//! a provisioning failure rolls the metadata back so no half-created group
//! is left behind.
//!
//! Group deletion runs in a fixed order so a crash mid-way leaves only
//! harmless orphans (data without metadata, never metadata without data):
//!
//! 1. metadata row (fails first if any view still references the group)
//! 2. offline table and its history
//! 3. online key namespace
//! 4. catalog cache entry, always last, so concurrent readers cannot
//!    repopulate the cache from a row that is about to disappear

use crate::{with_timeout, FeatureStore};
use featherstore_core::{online_key_prefix, FeatureGroup, FeatureStatistics, FeatureView, Result};
use featherstore_registry::{FeatureGroupSpec, FeatureViewSpec};
use tracing::{info, warn};

impl FeatureStore {
    /// Register a feature group and provision its offline table
    pub async fn create_feature_group(&self, spec: FeatureGroupSpec) -> Result<FeatureGroup> {
        let group = self.catalog().create_feature_group(spec).await?;

        let provisioned = with_timeout(
            self.config().offline_timeout(),
            "offline table creation",
            self.offline().create_table(&group.name),
        )
        .await;

        if let Err(e) = provisioned {
            // Roll the metadata back so the name is reusable
            if let Err(rollback) = self.catalog().delete_feature_group(&group.name).await {
                warn!(
                    feature_group = %group.name,
                    error = %rollback,
                    "Metadata rollback failed after table provisioning error"
                );
            }
            self.catalog().invalidate_group(&group.name);
            return Err(e);
        }

        Ok(group)
    }

    /// Register a feature view over existing groups
    ///
    /// Views are metadata only; no storage is provisioned, so a failed
    /// creation leaves no state at all.
    pub async fn create_feature_view(&self, spec: FeatureViewSpec) -> Result<FeatureView> {
        self.catalog().create_feature_view(spec).await
    }

    /// Additive schema evolution on an existing group
    pub async fn add_features(&self, name: &str, features: &[String]) -> Result<FeatureGroup> {
        self.catalog().add_features(name, features).await
    }

    /// Delete a feature group and everything derived from it
    ///
    /// Fails up front if the group is unknown or still referenced by a view.
    pub async fn delete_feature_group(&self, name: &str) -> Result<()> {
        self.catalog().delete_feature_group(name).await?;

        with_timeout(
            self.config().offline_timeout(),
            "offline table drop",
            self.offline().drop_table(name),
        )
        .await?;

        let keys_removed = with_timeout(
            self.config().online_timeout(),
            "online namespace delete",
            self.online().delete_by_prefix(&online_key_prefix(name)),
        )
        .await?;

        // Cache entry goes last; until here readers may still serve the
        // definition, which is stale but consistent
        self.catalog().invalidate_group(name);

        info!(feature_group = name, keys_removed, "Deleted feature group");
        Ok(())
    }

    /// Delete a feature view (metadata only, underlying groups untouched)
    pub async fn delete_feature_view(&self, name: &str) -> Result<()> {
        self.catalog().delete_feature_view(name).await
    }

    /// Statistics snapshots for one feature, newest first
    pub async fn get_statistics(
        &self,
        feature_group: &str,
        feature_name: &str,
    ) -> Result<Vec<FeatureStatistics>> {
        // Surfaces NotFound for unknown groups before touching storage
        let group = self.catalog().get_feature_group(feature_group).await?;
        with_timeout(
            self.config().offline_timeout(),
            "statistics read",
            self.offline().get_statistics(&group.name, feature_name),
        )
        .await
    }
}
