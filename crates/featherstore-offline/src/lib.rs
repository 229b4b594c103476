//! FeatherStore offline store: durable, append-only feature history
//!
//! One table per feature group, bulk appends chunked in transactions, and
//! time/entity filtered range reads for training-set assembly. This is the
//! source of truth in the dual-store design: the online cache may lag it but
//! never the other way around.
//!
//! The embedded backend is SQLite with WAL mode, matching the catalog. Feature
//! maps are stored as JSON columns of typed values; schema evolution on the
//! group never requires DDL here.

mod sqlite_store;

pub use sqlite_store::SqliteOfflineStore;
