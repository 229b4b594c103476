//! Store configuration
//!
//! Plain-data settings for the orchestration layer, deserializable from a
//! config file. Per-store connection settings live with the adapters; this is
//! only what the write and read paths themselves need.

use serde::Deserialize;
use std::time::Duration;

/// Settings for the feature store orchestration layer
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// TTL applied to online entries when a write gives none, in seconds
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,

    /// Upper bound for one offline operation (append, range read), in seconds
    #[serde(default = "default_offline_timeout_seconds")]
    pub offline_timeout_seconds: u64,

    /// Upper bound for one online operation (get, set, delete), in seconds
    #[serde(default = "default_online_timeout_seconds")]
    pub online_timeout_seconds: u64,
}

// Default value functions (used by serde)

fn default_ttl_seconds() -> u64 {
    24 * 60 * 60
}

fn default_offline_timeout_seconds() -> u64 {
    30
}

fn default_online_timeout_seconds() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: default_ttl_seconds(),
            offline_timeout_seconds: default_offline_timeout_seconds(),
            online_timeout_seconds: default_online_timeout_seconds(),
        }
    }
}

impl StoreConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    pub fn offline_timeout(&self) -> Duration {
        Duration::from_secs(self.offline_timeout_seconds)
    }

    pub fn online_timeout(&self) -> Duration {
        Duration::from_secs(self.online_timeout_seconds)
    }
}
