//! Layered configuration for a blobvault deployment.
//!
//! Sources, later ones overriding earlier ones:
//! - Bundled defaults (include_str! from blobvault.toml)
//! - `~/.config/blobvault/blobvault.toml`
//! - `./blobvault.toml`
//! - An explicit file (`--config`)
//! - `BLOBVAULT_*` environment variables, `__` between table and key

use blobvault_cache::CacheConfig;
use blobvault_engine::EngineConfig;
use blobvault_error::{ConfigError, ConfigErrorKind, VaultResult};
use blobvault_storage::BackendConfig;
use config::{Config, Environment, File, FileFormat};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, instrument};

const DEFAULT_CONFIG: &str = include_str!("../../../blobvault.toml");

/// Where file and blob records live.
///
/// # Example
///
/// ```toml
/// [metadata]
/// type = "postgres"
/// database_url = "postgres://blobvault@localhost/blobvault"
/// max_connections = 8
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// Process-local tables, lost on exit
    #[default]
    Memory,
    /// PostgreSQL (requires the `postgres` feature)
    Postgres {
        /// Connection string
        database_url: String,
        /// Pool size
        #[serde(default = "default_max_connections")]
        max_connections: u32,
    },
}

fn default_max_connections() -> u32 {
    8
}

impl MetadataConfig {
    /// `"memory"` or `"postgres"`.
    pub fn kind(&self) -> &'static str {
        match self {
            MetadataConfig::Memory => "memory",
            MetadataConfig::Postgres { .. } => "postgres",
        }
    }
}

/// Complete configuration of a [`crate::Vault`].
#[derive(
    Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Getters, derive_setters::Setters,
)]
#[setters(prefix = "with_")]
pub struct VaultConfig {
    /// Object backend
    #[serde(default)]
    storage: BackendConfig,
    /// Metadata store
    #[serde(default)]
    metadata: MetadataConfig,
    /// Read-through cache for file lookups
    #[serde(default)]
    cache: CacheConfig,
    /// Engine tuning
    #[serde(default)]
    engine: EngineConfig,
}

impl VaultConfig {
    /// Load configuration from a single file, without defaults or environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> VaultResult<Self> {
        debug!("Loading configuration from file");
        Self::build(Config::builder().add_source(File::from(path.as_ref())))
    }

    /// Load configuration from every source, the process environment last.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use blobvault::VaultConfig;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = VaultConfig::load(None)?;
    /// println!("storage: {}", config.storage().kind());
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any source fails to parse.
    pub fn load(explicit: Option<&Path>) -> VaultResult<Self> {
        Self::load_with_env(explicit, env_source())
    }

    /// Like [`VaultConfig::load`] with a caller-supplied environment source.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or any source fails to parse.
    #[instrument(skip(env), fields(explicit = ?explicit))]
    pub fn load_with_env(explicit: Option<&Path>, env: Environment) -> VaultResult<Self> {
        debug!("Loading configuration: env > explicit > current dir > home dir > bundled");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/blobvault/blobvault.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("blobvault").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path));
        }

        Self::build(builder.add_source(env))
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> VaultResult<Self> {
        let config = builder
            .build()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Load(e.to_string())))?
            .try_deserialize()
            .map_err(|e| ConfigError::new(ConfigErrorKind::Parse(e.to_string())))?;
        Ok(config)
    }
}

/// `BLOBVAULT_STORAGE__ROOT` sets `storage.root`, and so on.
pub fn env_source() -> Environment {
    Environment::with_prefix("BLOBVAULT")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
