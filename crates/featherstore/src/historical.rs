//! Historical read path: training reads over a time window
//!
//! Fans out one range read per feature group referenced by the view, then
//! joins the slices point-in-time correctly. The window is inclusive on both
//! ends; records carry their own event timestamps in the result so a training
//! pipeline can line features up with labels.

use crate::online_read::entity_key_for_group;
use crate::point_in_time::as_of_join;
use crate::{with_timeout, FeatureStore};
use chrono::{DateTime, Utc};
use featherstore_core::{Error, FeatureRow, Record, Result};
use tracing::debug;

impl FeatureStore {
    /// Point-in-time correct read of a view over `[start, end]`
    ///
    /// `entity_rows` filters the result to the given entities; an empty slice
    /// reads every entity with records in the window. One result row per
    /// distinct `(entity, event timestamp)` observed in any referenced group,
    /// ordered by entity then timestamp.
    pub async fn get_historical_features(
        &self,
        feature_view: &str,
        entity_rows: &[Record],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FeatureRow>> {
        if start > end {
            return Err(Error::query(format!(
                "start {start} is after end {end}"
            )));
        }

        let view = self.catalog().get_feature_view(feature_view).await?;

        let mut slices = Vec::with_capacity(view.feature_groups.len());
        for group_name in &view.feature_groups {
            let group = self.catalog().get_feature_group(group_name).await?;

            let entity_keys: Vec<String> = entity_rows
                .iter()
                .map(|row| entity_key_for_group(&group, row))
                .collect::<Result<_>>()?;

            let records = with_timeout(
                self.config().offline_timeout(),
                "offline range read",
                self.offline()
                    .range_query(&group.name, &entity_keys, start, end),
            )
            .await?;
            slices.push((group, records));
        }

        let rows = as_of_join(&view.features, &view.entities, &slices);
        debug!(
            feature_view,
            groups = slices.len(),
            rows = rows.len(),
            "Historical read complete"
        );
        Ok(rows)
    }
}
