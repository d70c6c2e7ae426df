//! Configuration management for treestash

pub mod schema;
pub mod settings;

pub use schema::{ArchiveConfig, Backend, Config, ProbeFailurePolicy, StoreConfig};
pub use settings::{ActionInputs, Operation, Settings};

use crate::error::{TreestashError, TreestashResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the config file discovered in the working directory
pub const LOCAL_CONFIG_FILE: &str = ".treestash.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load from an explicit file, which must exist
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: Some(path),
        }
    }

    /// Look for `.treestash.toml` in the working directory
    pub fn discover(workdir: &Path) -> Self {
        let candidate = workdir.join(LOCAL_CONFIG_FILE);
        if candidate.is_file() {
            debug!("Found local config: {}", candidate.display());
            Self {
                config_path: Some(candidate),
            }
        } else {
            Self { config_path: None }
        }
    }

    /// Load configuration, using defaults when no file applies
    pub async fn load(&self) -> TreestashResult<Config> {
        match &self.config_path {
            Some(path) => Self::load_from_file(path).await,
            None => {
                debug!("No config file, using defaults");
                Ok(Config::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(path: &Path) -> TreestashResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| TreestashError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| TreestashError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path, if any
    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
