//! Configuration
//!
//! Layered with the `config` crate: built-in defaults, the global file
//! (`$XDG_CONFIG_HOME/vfstore/config.toml`), an explicit `--config` file, then
//! `VFSTORE__SECTION__KEY` environment variables.

mod facade;
mod storage_paths;

pub mod merge {
    pub mod policy;
    pub mod service;
}

pub mod paths {
    pub mod xdg_root;
}

pub mod sources {
    pub mod environment;
    pub mod global_file;
}

use crate::error::{VfsError, VfsResult};
use crate::logging::LoggingConfig;
use crate::types::ProjectConfig;
use crate::vfs::{normalize_path, validate_bucket_name};
use serde::{Deserialize, Serialize};

pub use facade::ConfigLoader;
pub use paths::xdg_root as xdg;
pub use storage_paths::StorageConfig;

fn default_app_bucket() -> String {
    "app".to_string()
}

fn default_spa_index() -> String {
    "index.html".to_string()
}

fn default_short_cache_secs() -> u64 {
    300
}

fn default_long_cache_secs() -> u64 {
    31_536_000
}

/// Serving facade policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingConfig {
    /// Bucket holding the deployed single-page application
    #[serde(default = "default_app_bucket")]
    pub app_bucket: String,

    /// Entry point served when an app path does not exist
    #[serde(default = "default_spa_index")]
    pub spa_index: String,

    /// max-age for compressible (text-like) content
    #[serde(default = "default_short_cache_secs")]
    pub short_cache_secs: u64,

    /// max-age for everything else
    #[serde(default = "default_long_cache_secs")]
    pub long_cache_secs: u64,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            app_bucket: default_app_bucket(),
            spa_index: default_spa_index(),
            short_cache_secs: default_short_cache_secs(),
            long_cache_secs: default_long_cache_secs(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Limits given to projects created from now on
    #[serde(default)]
    pub limits: ProjectConfig,

    #[serde(default)]
    pub serving: ServingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VfsConfig {
    pub fn validate(&self) -> VfsResult<()> {
        self.limits
            .validate()
            .map_err(|e| VfsError::Config(format!("limits: {}", e)))?;
        validate_bucket_name(&self.serving.app_bucket)
            .map_err(|e| VfsError::Config(format!("serving.app_bucket: {}", e)))?;
        normalize_path(&self.serving.spa_index)
            .map_err(|e| VfsError::Config(format!("serving.spa_index: {}", e)))?;
        Ok(())
    }
}
