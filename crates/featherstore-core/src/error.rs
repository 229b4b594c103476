//! Error types for FeatherStore
//!
//! All components of the feature store share this error taxonomy. We use the
//! `thiserror` crate to make error definitions concise and ergonomic.
//!
//! ## Propagation policy
//!
//! - Validation and catalog-lookup errors surface synchronously to the caller
//!   before any storage is touched.
//! - Offline-store failures during a write abort the whole write and propagate
//!   as `StoreUnavailable`.
//! - Online-store failures during a write are caught and logged by the write
//!   path; they degrade cache freshness, not correctness, and never appear as
//!   an error to the caller.
//! - Online-read misses (TTL expiry, never-written entity) are not errors; the
//!   read path represents them as null feature values.

use thiserror::Error;

/// Result type alias for operations that can fail
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors that can occur in FeatherStore
#[derive(Error, Debug)]
pub enum Error {
    /// Feature group was not found in the catalog
    #[error("Feature group '{0}' not found")]
    FeatureGroupNotFound(String),

    /// Feature view was not found in the catalog
    #[error("Feature view '{0}' not found")]
    FeatureViewNotFound(String),

    /// A feature group or view with this name already exists
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// Batch failed the schema check (fails fast, no partial write)
    ///
    /// The message lists every violation found, not just the first.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Connectivity or timeout failure against a backing store
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed time range or entity set on a historical read
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization/deserialization error (JSON)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error - this should rarely happen
    #[error("Internal error: {0}")]
    Internal(String),
}

// Helper implementations to make error creation more ergonomic

impl Error {
    /// Creates a Validation error from a string
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a StoreUnavailable error from a string
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Creates a Query error from a string
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates an Internal error from a string
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
