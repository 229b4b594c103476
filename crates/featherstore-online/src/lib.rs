//! FeatherStore online store adapters: low-latency feature serving
//!
//! The online store holds the latest feature values per entity under a
//! bounded TTL. It is a last-write-wins cache over the offline source of
//! truth: a miss (TTL expiry, never written, eviction) is a valid outcome for
//! readers, and the next write for an entity repairs staleness.
//!
//! Two adapters:
//!
//! - [`MemoryOnlineStore`]: embedded, zero-dependency, with a test clock for
//!   exercising TTL expiry deterministically
//! - [`RedisOnlineStore`]: pipelined Redis, behind the `redis` cargo feature
//!   (default on); integration tests require a running server and are ignored
//!   by default

pub use featherstore_core::{build_online_key, online_key_prefix, OnlineEntry, OnlineStore};

mod memory_store;
pub use memory_store::MemoryOnlineStore;

#[cfg(feature = "redis")]
mod redis_store;
#[cfg(feature = "redis")]
pub use redis_store::{RedisConfig, RedisOnlineStore};
