//! MergeService: orchestrates sources, applies merge policy, deserializes to VfsConfig.

use super::policy;
use crate::config::sources::{environment, global_file};
use crate::config::VfsConfig;
use config::ConfigError;
use std::path::Path;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Precedence: defaults (lowest) -> global file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<VfsConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = match explicit {
            Some(path) => global_file::add_file(builder, path, true)?,
            None => builder,
        };
        let builder = environment::add_to_builder(builder)?;
        builder.build()?.try_deserialize()
    }

    /// Load one file with the environment overlay, skipping the global file.
    pub fn load_from_file(path: &Path) -> Result<VfsConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = global_file::add_file(builder, path, true)?;
        let builder = environment::add_to_builder(builder)?;
        builder.build()?.try_deserialize()
    }
}
