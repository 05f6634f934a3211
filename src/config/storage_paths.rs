//! StorageConfig and data directory resolution.

use super::xdg;
use crate::error::{VfsError, VfsResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root holding one sled database per project; None means the XDG default
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Project bound when the CLI is not given `--project`
    #[serde(default)]
    pub default_project: Option<String>,
}

impl StorageConfig {
    /// Explicit `data_dir`, else `$XDG_DATA_HOME/vfstore/projects`.
    pub fn resolve_data_dir(&self) -> VfsResult<PathBuf> {
        if let Some(dir) = self.data_dir.as_ref().filter(|d| !d.as_os_str().is_empty()) {
            return Ok(dir.clone());
        }
        let data_dir = xdg::vfstore_data_dir().ok_or_else(|| {
            VfsError::Config(
                "Could not determine XDG data home directory (HOME not set)".to_string(),
            )
        })?;
        Ok(data_dir.join("projects"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = StorageConfig {
            data_dir: Some(PathBuf::from("/srv/vfstore")),
            default_project: None,
        };
        assert_eq!(config.resolve_data_dir().unwrap(), PathBuf::from("/srv/vfstore"));
    }

    #[test]
    fn test_default_data_dir_is_under_vfstore() {
        if xdg::data_home().is_none() {
            return;
        }
        let dir = StorageConfig::default().resolve_data_dir().unwrap();
        assert!(dir.ends_with("vfstore/projects"));
    }
}
