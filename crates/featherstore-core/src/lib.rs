//! # FeatherStore Core Library
//!
//! Foundation crate for FeatherStore, containing the types and traits used
//! across the whole feature store.
//!
//! ## Key Components
//!
//! - **Types**: `FeatureValue`, `FeatureGroup`, `FeatureView`, write-path
//!   records and read-path rows
//! - **Traits**: `OnlineStore` (low-latency cache) and `OfflineStore`
//!   (durable history), the seams the store adapters implement
//! - **Validation**: batch schema checks against a feature group
//! - **Statistics**: per-batch distribution snapshots for drift analysis
//! - **Errors**: the shared, strongly-typed error taxonomy
//!
//! This crate holds no storage implementation; adapters live in
//! `featherstore-offline` and `featherstore-online`, the catalog in
//! `featherstore-registry`, and orchestration in `featherstore`.

pub use error::{Error, Result};
pub use lock::{recover_mutex, recover_read, recover_write};
pub use offline::{OfflineRecord, OfflineStore};
pub use online::{build_online_key, online_key_prefix, OnlineEntry, OnlineStore};
pub use stats::{compute_batch_statistics, FeatureStatistics};
pub use types::{record_timestamp, FeatureGroup, FeatureRow, FeatureValue, FeatureView, Record};
pub use validation::{validate_batch, ValidationReport};

mod error;
mod lock;
mod offline;
mod online;
pub mod stats;
pub mod types;
pub mod validation;

// Commonly used imports for downstream crates
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::offline::{OfflineRecord, OfflineStore};
    pub use crate::online::{OnlineEntry, OnlineStore};
    pub use crate::types::{FeatureGroup, FeatureRow, FeatureValue, FeatureView, Record};
}
