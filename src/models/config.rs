use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/vecstore";
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_TABLE_NAME: &str = "vector_store";
pub const DEFAULT_DIMENSIONS: usize = 1024;

/// Environment variable overriding [`DatabaseConfig::url`].
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

static TABLE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}(\.[A-Za-z_][A-Za-z0-9_]{0,62})?$")
        .unwrap_or_else(|e| panic!("table name pattern is invalid: {e}"))
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("vecstore").join("config.toml"))
    }

    /// Load from the default config path, falling back to defaults when the
    /// file does not exist. `DATABASE_URL` (environment or `.env`) wins over
    /// the file.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::read(&path)?,
            _ => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::PathError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        let mut config = Self::read(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    fn apply_env(&mut self) {
        // A missing .env file is the common case.
        let _ = dotenvy::dotenv();
        if let Ok(url) = std::env::var(DATABASE_URL_ENV)
            && !url.is_empty()
        {
            self.database.url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store.validate()?;
        if self.database.pool_max == 0 {
            return Err(ConfigError::ValidationError(
                "database.pool_max must be positive".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for one vector table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Vector dimension D, fixed for the lifetime of the table.
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Records per write transaction.
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,

    #[serde(default)]
    pub index: IndexConfig,

    /// Upper bound for every backend round-trip, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_timeout_ms: Option<u64>,
}

fn default_table_name() -> String {
    DEFAULT_TABLE_NAME.to_string()
}

fn default_dimensions() -> usize {
    DEFAULT_DIMENSIONS
}

fn default_write_batch_size() -> usize {
    50
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            table_name: default_table_name(),
            dimensions: default_dimensions(),
            write_batch_size: default_write_batch_size(),
            index: IndexConfig::default(),
            operation_timeout_ms: None,
        }
    }
}

impl StoreConfig {
    pub fn new(table_name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            table_name: table_name.into(),
            dimensions,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size;
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.operation_timeout_ms = Some(millis.max(1));
        self
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !TABLE_NAME_RE.is_match(&self.table_name) {
            return Err(ConfigError::ValidationError(format!(
                "invalid table name: {:?}",
                self.table_name
            )));
        }
        if self.dimensions == 0 {
            return Err(ConfigError::ValidationError(
                "store.dimensions must be positive".to_string(),
            ));
        }
        if self.write_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "store.write_batch_size must be positive".to_string(),
            ));
        }
        self.index.validate()
    }

    /// Name used for derived objects such as the vector index.
    pub fn index_name(&self) -> String {
        let base = self
            .table_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.table_name);
        format!("{base}_embedding_idx")
    }
}

/// Approximate nearest-neighbor index tuning (IVF).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Number of inverted-file partitions (`lists`).
    #[serde(default = "default_partitions")]
    pub partitions: u32,

    /// Target recall percentage, 1..=100.
    #[serde(default = "default_target_accuracy")]
    pub target_accuracy: u8,
}

fn default_partitions() -> u32 {
    10
}

fn default_target_accuracy() -> u8 {
    95
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            partitions: default_partitions(),
            target_accuracy: default_target_accuracy(),
        }
    }
}

impl IndexConfig {
    /// Partitions scanned per query for the configured accuracy.
    pub fn probes(&self) -> u32 {
        let probes = (u64::from(self.partitions) * u64::from(self.target_accuracy)).div_ceil(100);
        u32::try_from(probes).unwrap_or(self.partitions).max(1)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions == 0 {
            return Err(ConfigError::ValidationError(
                "store.index.partitions must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.target_accuracy) {
            return Err(ConfigError::ValidationError(format!(
                "store.index.target_accuracy must be within 1..=100, got {}",
                self.target_accuracy
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u64 {
    30
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_max: default_pool_max(),
            pool_acquire_timeout_secs: default_pool_acquire_timeout(),
        }
    }
}

/// How the embedding service treats inputs over the token budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Truncate {
    /// Reject oversized inputs.
    #[default]
    None,
    /// Drop tokens from the start of the input.
    Start,
    /// Drop tokens from the end of the input.
    End,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum inputs per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default)]
    pub truncate: Truncate,

    /// Attempts per request before a transient failure is surfaced.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_batch_size() -> usize {
    96
}

fn default_max_input_tokens() -> usize {
    512
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            max_input_tokens: default_max_input_tokens(),
            truncate: Truncate::None,
            max_attempts: default_max_attempts(),
        }
    }
}
