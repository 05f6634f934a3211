//! Logging System
//!
//! Structured logging through `tracing`. Level, format and destination come
//! from [`LoggingConfig`], with `VFSTORE_LOG*` environment variables taking
//! precedence.

use crate::error::{VfsError, VfsResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Resolve the log file path with precedence: CLI, VFSTORE_LOG_FILE env, config file, default.
///
/// The default lives in the platform state directory, under a per-project
/// segment when a project is given.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    project_id: Option<&str>,
) -> VfsResult<PathBuf> {
    if let Some(p) = cli_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    if let Ok(env_path) = std::env::var("VFSTORE_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    if let Some(p) = config_file.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(p);
    }
    default_log_file_path(project_id)
}

fn default_log_file_path(project_id: Option<&str>) -> VfsResult<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "vfstore", "vfstore").ok_or_else(|| {
        VfsError::Config("Could not determine platform directories for log file".to_string())
    })?;
    // state_dir is Linux-only; elsewhere fall back to the local data dir.
    let base = dirs
        .state_dir()
        .unwrap_or_else(|| dirs.data_local_dir())
        .to_path_buf();
    let dir = match project_id {
        Some(id) => base.join("projects").join(id),
        None => base,
    };
    Ok(dir.join("vfstore.log"))
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: json, text (default: text)
    #[serde(default = "default_format")]
    pub format: String,

    /// Output destination: stdout, stderr, file, file+stderr, both
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file path when output includes file; None means use runtime default
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored output (text format, terminal destinations only)
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `vfstore::store = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: None,
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Initialize the global subscriber.
///
/// Priority order (highest to lowest):
/// 1. Environment variables (VFSTORE_LOG, VFSTORE_LOG_FORMAT, ...)
/// 2. Configuration (file, or CLI flags folded into it)
/// 3. Defaults
pub fn init_logging(config: Option<&LoggingConfig>) -> VfsResult<()> {
    if config.map(|c| !c.enabled).unwrap_or(false) {
        Registry::default()
            .with(EnvFilter::new("off"))
            .with(fmt::layer().with_writer(std::io::sink))
            .init();
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format = determine_format(config)?;
    let output = determine_output(config)?;
    let use_color = config.map(|c| c.color).unwrap_or(true) && !output.file;
    let writer = output.make_writer(config.and_then(|c| c.file.clone()))?;

    let registry = Registry::default().with(filter);
    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(use_color)
                    .with_writer(writer),
            )
            .init(),
    }
    Ok(())
}

/// Build environment filter from config or environment variables
fn build_env_filter(config: Option<&LoggingConfig>) -> VfsResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env("VFSTORE_LOG") {
        return Ok(filter);
    }

    let level = config.map(|c| c.level.as_str()).unwrap_or("warn");
    if level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut directives: Vec<String> = Vec::new();
    if let Some(config) = config {
        directives.extend(
            config
                .modules
                .iter()
                .map(|(module, module_level)| format!("{}={}", module, module_level)),
        );
    }
    if let Ok(modules) = std::env::var("VFSTORE_LOG_MODULES") {
        directives.extend(modules.split(',').filter_map(|spec| {
            let (module, module_level) = spec.split_once('=')?;
            Some(format!("{}={}", module.trim(), module_level.trim()))
        }));
    }

    let mut filter = EnvFilter::new(level);
    for directive in directives {
        filter = filter.add_directive(
            directive
                .parse()
                .map_err(|e| VfsError::Config(format!("Invalid log directive '{}': {}", directive, e)))?,
        );
    }
    Ok(filter)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

fn parse_format(format: &str) -> Option<LogFormat> {
    match format {
        "text" => Some(LogFormat::Text),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Determine output format from environment or config
fn determine_format(config: Option<&LoggingConfig>) -> VfsResult<LogFormat> {
    if let Some(format) = std::env::var("VFSTORE_LOG_FORMAT")
        .ok()
        .as_deref()
        .and_then(parse_format)
    {
        return Ok(format);
    }
    let format = config.map(|c| c.format.as_str()).unwrap_or("text");
    parse_format(format).ok_or_else(|| {
        VfsError::Config(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            format
        ))
    })
}

/// Output destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OutputDestinations {
    stdout: bool,
    stderr: bool,
    file: bool,
}

impl OutputDestinations {
    fn make_writer(&self, configured_file: Option<PathBuf>) -> VfsResult<BoxMakeWriter> {
        let file = if self.file {
            let path = resolve_log_file_path(None, configured_file, None)?;
            Some(open_log_file(&path)?)
        } else {
            None
        };
        let writer = match (file, self.stdout, self.stderr) {
            (Some(file), _, true) => BoxMakeWriter::new(file.and(std::io::stderr)),
            (Some(file), _, false) => BoxMakeWriter::new(file),
            (None, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
            (None, true, false) => BoxMakeWriter::new(std::io::stdout),
            (None, false, _) => BoxMakeWriter::new(std::io::stderr),
        };
        Ok(writer)
    }
}

fn open_log_file(path: &std::path::Path) -> VfsResult<std::sync::Arc<std::fs::File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| VfsError::Config(format!("Failed to create log directory: {}", e)))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| VfsError::Config(format!("Failed to open log file {:?}: {}", path, e)))?;
    Ok(std::sync::Arc::new(file))
}

/// Determine output destinations from environment or config
fn determine_output(config: Option<&LoggingConfig>) -> VfsResult<OutputDestinations> {
    if let Ok(output) = std::env::var("VFSTORE_LOG_OUTPUT") {
        return parse_output_destinations(&output);
    }
    let output = config.map(|c| c.output.as_str()).unwrap_or("stderr");
    parse_output_destinations(output)
}

fn parse_output_destinations(output: &str) -> VfsResult<OutputDestinations> {
    let (stdout, stderr, file) = match output {
        "stdout" => (true, false, false),
        "stderr" => (false, true, false),
        "file" => (false, false, true),
        "file+stderr" => (false, true, true),
        "both" => (true, true, false),
        _ => {
            return Err(VfsError::Config(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                output
            )))
        }
    };
    Ok(OutputDestinations {
        stdout,
        stderr,
        file,
    })
}
