//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::VfsConfig;
use crate::error::VfsResult;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from the global file, an optional explicit file and the environment,
    /// then validate.
    pub fn load(explicit: Option<&Path>) -> VfsResult<VfsConfig> {
        let config = MergeService::load(explicit)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> VfsResult<VfsConfig> {
        let config = MergeService::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> VfsConfig {
        VfsConfig::default()
    }
}
