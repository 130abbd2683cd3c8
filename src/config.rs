//! Engine configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! { "scope_id": 1, "schema_dir": "schemas", "api_base": "/api", "log_filter": "info" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resource::UriResolver;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scope (instance) id every row is partitioned by (required)
    pub scope_id: i64,

    /// Directory of resource definition files (required)
    pub schema_dir: PathBuf,

    /// Path prefix of resource links (default "/api")
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Log filter used when `RUST_LOG` is unset (default "info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_api_base() -> String {
    "/api".to_string()
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.schema_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("schema_dir must not be empty".into()));
        }
        if !self.api_base.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api_base '{}' must start with '/'",
                self.api_base
            )));
        }
        if self.api_base.len() > 1 && self.api_base.ends_with('/') {
            return Err(ConfigError::Invalid(format!(
                "api_base '{}' must not end with '/'",
                self.api_base
            )));
        }
        Ok(())
    }

    /// Link resolver for the configured API base
    pub fn uri_resolver(&self) -> UriResolver {
        UriResolver::new(self.api_base.clone())
    }
}
