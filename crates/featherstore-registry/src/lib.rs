//! Metadata catalog for FeatherStore
//!
//! The catalog is the registry of feature group and feature view definitions,
//! backed by durable storage with a read-mostly in-memory cache in front. All
//! other components resolve definitions through it before touching data.
//!
//! ## Cache policy
//!
//! Reads are cache-first and populate the cache lazily on a miss. Writers
//! (create, evolve, delete) invalidate or overwrite the specific entry, never
//! the whole cache, to avoid stampedes under concurrent reads.
//!
//! ## Contracts
//!
//! - `create_feature_group` fails with `AlreadyExists` if the name is taken
//! - `create_feature_view` fails with `FeatureGroupNotFound` if any referenced
//!   group does not exist, and with `Validation` if any requested feature or
//!   entity column is not a member of its referenced group
//! - a group's `entity_columns` and `timestamp_column` are immutable after
//!   creation; schema evolution is additive only (`add_features`)
//! - deleting a group still referenced by a view is a blocking error

use chrono::Utc;
use featherstore_core::{recover_read, recover_write, Error, FeatureGroup, FeatureView, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

pub mod backend;
mod schema;
mod sqlite_backend;

pub use backend::{CatalogBackend, CatalogConfig};
pub use sqlite_backend::SqliteCatalogBackend;

/// Creation request for a feature group
#[derive(Debug, Clone)]
pub struct FeatureGroupSpec {
    pub name: String,
    pub description: String,
    pub features: Vec<String>,
    pub timestamp_column: String,
    pub entity_columns: Vec<String>,
    pub tags: BTreeMap<String, String>,
}

/// Creation request for a feature view
#[derive(Debug, Clone)]
pub struct FeatureViewSpec {
    pub name: String,
    pub feature_groups: Vec<String>,
    pub features: Vec<String>,
    pub entities: Vec<String>,
    pub ttl: Option<Duration>,
}

/// Cache-fronted metadata catalog
pub struct FeatureCatalog {
    backend: Arc<dyn CatalogBackend>,
    groups: RwLock<HashMap<String, FeatureGroup>>,
    views: RwLock<HashMap<String, FeatureView>>,
}

impl FeatureCatalog {
    /// Create a catalog with the specified backend configuration
    pub async fn new(config: CatalogConfig) -> Result<Self> {
        let backend: Arc<dyn CatalogBackend> = match config {
            CatalogConfig::Sqlite { path } => {
                Arc::new(SqliteCatalogBackend::new(&path).map_err(backend_err)?)
            }
        };
        backend.init_schema().await.map_err(backend_err)?;

        Ok(Self {
            backend,
            groups: RwLock::new(HashMap::new()),
            views: RwLock::new(HashMap::new()),
        })
    }

    /// Create an in-memory catalog (for testing)
    pub async fn in_memory() -> Result<Self> {
        let backend = Arc::new(SqliteCatalogBackend::in_memory().map_err(backend_err)?);
        backend.init_schema().await.map_err(backend_err)?;
        Ok(Self {
            backend,
            groups: RwLock::new(HashMap::new()),
            views: RwLock::new(HashMap::new()),
        })
    }

    /// Register a new feature group
    pub async fn create_feature_group(&self, spec: FeatureGroupSpec) -> Result<FeatureGroup> {
        validate_name(&spec.name)?;
        if spec.entity_columns.is_empty() {
            return Err(Error::validation("entity_columns must not be empty"));
        }
        if spec.timestamp_column.is_empty() {
            return Err(Error::validation("timestamp_column must not be empty"));
        }
        let mut seen = HashSet::new();
        for feature in &spec.features {
            if feature.is_empty() {
                return Err(Error::validation("feature names must not be empty"));
            }
            if feature == &spec.timestamp_column || spec.entity_columns.contains(feature) {
                return Err(Error::validation(format!(
                    "feature '{feature}' collides with an entity or timestamp column"
                )));
            }
            if !seen.insert(feature.clone()) {
                return Err(Error::validation(format!("duplicate feature '{feature}'")));
            }
        }

        if self
            .backend
            .get_feature_group(&spec.name)
            .await
            .map_err(backend_err)?
            .is_some()
        {
            return Err(Error::AlreadyExists(spec.name));
        }

        let now = Utc::now();
        let group = FeatureGroup {
            name: spec.name,
            description: spec.description,
            features: spec.features,
            timestamp_column: spec.timestamp_column,
            entity_columns: spec.entity_columns,
            version: 1,
            tags: spec.tags,
            created_at: now,
            updated_at: now,
        };

        self.backend
            .upsert_feature_group(&group)
            .await
            .map_err(backend_err)?;
        self.cache_group(group.clone());

        info!(feature_group = %group.name, "Created feature group");
        Ok(group)
    }

    /// Register a new feature view over existing groups
    pub async fn create_feature_view(&self, spec: FeatureViewSpec) -> Result<FeatureView> {
        validate_name(&spec.name)?;
        if spec.feature_groups.is_empty() {
            return Err(Error::validation("feature_groups must not be empty"));
        }
        if spec.entities.is_empty() {
            return Err(Error::validation("entities must not be empty"));
        }

        // Every referenced group must exist before any state is created
        let mut groups = Vec::with_capacity(spec.feature_groups.len());
        for group_name in &spec.feature_groups {
            groups.push(self.get_feature_group(group_name).await?);
        }

        let available: HashSet<&String> = groups.iter().flat_map(|g| g.features.iter()).collect();
        let unknown: Vec<&String> = spec
            .features
            .iter()
            .filter(|f| !available.contains(f))
            .collect();
        if !unknown.is_empty() {
            return Err(Error::validation(format!(
                "features not declared by any referenced group: {}",
                unknown
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        for entity in &spec.entities {
            for group in &groups {
                if !group.entity_columns.contains(entity) {
                    return Err(Error::validation(format!(
                        "entity column '{entity}' is not an entity column of group '{}'",
                        group.name
                    )));
                }
            }
        }

        if self
            .backend
            .get_feature_view(&spec.name)
            .await
            .map_err(backend_err)?
            .is_some()
        {
            return Err(Error::AlreadyExists(spec.name));
        }

        let now = Utc::now();
        let view = FeatureView {
            name: spec.name,
            feature_groups: spec.feature_groups,
            features: spec.features,
            entities: spec.entities,
            ttl_seconds: spec.ttl.map(|d| d.as_secs() as i64),
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.backend
            .upsert_feature_view(&view)
            .await
            .map_err(backend_err)?;
        self.cache_view(view.clone());

        info!(feature_view = %view.name, "Created feature view");
        Ok(view)
    }

    /// Get a feature group, cache-first
    pub async fn get_feature_group(&self, name: &str) -> Result<FeatureGroup> {
        if let Some(group) = recover_read(&self.groups, "catalog group cache").get(name) {
            return Ok(group.clone());
        }

        match self
            .backend
            .get_feature_group(name)
            .await
            .map_err(backend_err)?
        {
            Some(group) => {
                self.cache_group(group.clone());
                Ok(group)
            }
            None => Err(Error::FeatureGroupNotFound(name.to_string())),
        }
    }

    /// Get a feature view, cache-first
    pub async fn get_feature_view(&self, name: &str) -> Result<FeatureView> {
        if let Some(view) = recover_read(&self.views, "catalog view cache").get(name) {
            return Ok(view.clone());
        }

        match self
            .backend
            .get_feature_view(name)
            .await
            .map_err(backend_err)?
        {
            Some(view) => {
                self.cache_view(view.clone());
                Ok(view)
            }
            None => Err(Error::FeatureViewNotFound(name.to_string())),
        }
    }

    /// List all feature groups
    pub async fn list_feature_groups(&self) -> Result<Vec<FeatureGroup>> {
        self.backend.list_feature_groups().await.map_err(backend_err)
    }

    /// List all feature views
    pub async fn list_feature_views(&self) -> Result<Vec<FeatureView>> {
        self.backend.list_feature_views().await.map_err(backend_err)
    }

    /// Additive schema evolution: declare new features on an existing group
    ///
    /// Already-declared names are ignored (never repurposed). Bumps the
    /// group's version when anything was added.
    pub async fn add_features(&self, name: &str, new_features: &[String]) -> Result<FeatureGroup> {
        let mut group = self.get_feature_group(name).await?;

        let mut added = false;
        for feature in new_features {
            if feature.is_empty() {
                return Err(Error::validation("feature names must not be empty"));
            }
            if feature == &group.timestamp_column || group.entity_columns.contains(feature) {
                return Err(Error::validation(format!(
                    "feature '{feature}' collides with an entity or timestamp column"
                )));
            }
            if !group.features.contains(feature) {
                group.features.push(feature.clone());
                added = true;
            }
        }

        if added {
            group.version += 1;
            group.updated_at = Utc::now();
            self.backend
                .upsert_feature_group(&group)
                .await
                .map_err(backend_err)?;
            self.cache_group(group.clone());
            info!(feature_group = name, version = group.version, "Evolved feature group schema");
        }

        Ok(group)
    }

    /// Delete a feature group's metadata row
    ///
    /// Fails if any feature view still references the group (views are not
    /// auto-repaired). Removes only the durable row; callers that clean up
    /// dependent data afterwards must call [`invalidate_group`] last, per the
    /// lifecycle ordering. [`invalidate_group`]: Self::invalidate_group
    pub async fn delete_feature_group(&self, name: &str) -> Result<()> {
        // Surface NotFound before the reference check
        let _ = self.get_feature_group(name).await?;

        let referencing: Vec<String> = self
            .list_feature_views()
            .await?
            .into_iter()
            .filter(|v| v.feature_groups.iter().any(|g| g == name))
            .map(|v| v.name)
            .collect();
        if !referencing.is_empty() {
            return Err(Error::validation(format!(
                "feature group '{name}' is still referenced by feature views: {}",
                referencing.join(", ")
            )));
        }

        self.backend
            .delete_feature_group(name)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    /// Delete a feature view and evict its cache entry
    pub async fn delete_feature_view(&self, name: &str) -> Result<()> {
        let _ = self.get_feature_view(name).await?;
        self.backend
            .delete_feature_view(name)
            .await
            .map_err(backend_err)?;
        recover_write(&self.views, "catalog view cache").remove(name);
        info!(feature_view = name, "Deleted feature view");
        Ok(())
    }

    /// Evict one group entry from the cache (never clears the whole cache)
    pub fn invalidate_group(&self, name: &str) {
        recover_write(&self.groups, "catalog group cache").remove(name);
    }

    fn cache_group(&self, group: FeatureGroup) {
        recover_write(&self.groups, "catalog group cache").insert(group.name.clone(), group);
    }

    fn cache_view(&self, view: FeatureView) {
        recover_write(&self.views, "catalog view cache").insert(view.name.clone(), view);
    }
}

/// Names become SQL table names and online key namespaces, so they are
/// restricted to identifier characters.
fn validate_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid name '{name}': must start with a letter and contain only letters, digits and underscores"
        )))
    }
}

fn backend_err(e: anyhow::Error) -> Error {
    Error::store_unavailable(format!("catalog backend: {e:#}"))
}
