//! Engine configuration.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`crate::DedupEngine`].
///
/// # Example
///
/// ```
/// use blobvault_engine::EngineConfig;
///
/// let config = EngineConfig::default().with_location_prefix("objects".to_string());
/// assert_eq!(config.location_prefix(), "objects");
/// assert_eq!(*config.max_commit_attempts(), 3);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Getters,
    derive_setters::Setters,
    derive_builder::Builder,
)]
#[setters(prefix = "with_")]
#[builder(default)]
pub struct EngineConfig {
    /// First path segment of every candidate location
    #[serde(default = "default_location_prefix")]
    location_prefix: String,

    /// How often store retries when a blob is retired between lookup and increment
    #[serde(default = "default_max_commit_attempts")]
    max_commit_attempts: u32,
}

fn default_location_prefix() -> String {
    "blobs".to_string()
}

fn default_max_commit_attempts() -> u32 {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            location_prefix: default_location_prefix(),
            max_commit_attempts: default_max_commit_attempts(),
        }
    }
}
