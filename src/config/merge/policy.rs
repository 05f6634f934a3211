//! Merge policy: built-in defaults form the lowest layer.

use crate::config::ServingConfig;
use crate::types::ProjectConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Builder seeded with every scalar default, so later layers may set any subset.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let limits = ProjectConfig::default();
    let serving = ServingConfig::default();
    Config::builder()
        .set_default("limits.max_file_size", limits.max_file_size)?
        .set_default("limits.max_storage", limits.max_storage)?
        .set_default("limits.chunk_threshold", limits.chunk_threshold)?
        .set_default("limits.chunk_size", limits.chunk_size)?
        .set_default("limits.compression", limits.compression)?
        .set_default("serving.app_bucket", serving.app_bucket)?
        .set_default("serving.spa_index", serving.spa_index)?
        .set_default("serving.short_cache_secs", serving.short_cache_secs)?
        .set_default("serving.long_cache_secs", serving.long_cache_secs)
}
