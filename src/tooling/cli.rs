//! CLI Tooling
//!
//! Command-line interface over one project's virtual file store. Every command
//! binds the project, runs, then flushes the store.

use crate::config::{ConfigLoader, VfsConfig};
use crate::engine::{FileStorageEngine, ListOptions, SortField, SortOrder};
use crate::error::{VfsError, VfsResult};
use crate::mime::ExtensionMimeResolver;
use crate::store::SledStoreFactory;
use crate::types::{BucketRecord, FileRecord};
use crate::vfs::{CreateBucketOptions, CreateFileOptions, VfsManager};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::Table;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DEFAULT_PROJECT: &str = "default";

/// vfstore - project-scoped virtual file store
#[derive(Parser, Debug)]
#[command(name = "vfstore")]
#[command(about = "Project-scoped virtual file store with buckets, quotas and chunked blobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding one database per project
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Project to operate on
    #[arg(long, short)]
    pub project: Option<String>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a file from a local file
    Put {
        path: String,
        file: PathBuf,
        /// MIME type; inferred from the extension when omitted
        #[arg(long)]
        mime: Option<String>,
    },
    /// Replace an existing file's content
    Update { path: String, file: PathBuf },
    /// Print a file's content
    Cat {
        path: String,
        /// Write to this local file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete a file
    Rm { path: String },
    /// Delete everything under a directory
    Rmdir {
        path: String,
        #[arg(long, short)]
        recursive: bool,
    },
    /// Move a file
    Mv { from: String, to: String },
    /// List files
    Ls {
        /// Directory; the whole project when omitted
        dir: Option<String>,
        #[arg(long, short)]
        recursive: bool,
        #[arg(long, value_enum, default_value_t = SortArg::Name)]
        sort: SortArg,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value = "0")]
        offset: usize,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show usage statistics
    Stats {
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Manage buckets
    Bucket {
        #[command(subcommand)]
        command: BucketCommands,
    },
    /// Upload a local directory into a bucket, replacing files that exist
    Deploy {
        dir: PathBuf,
        #[arg(long, default_value = "app")]
        bucket: String,
    },
    /// Delete chunks no file references
    Gc,
    /// Recompute usage counters from the file collection
    Repair,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Subcommand, Debug)]
pub enum BucketCommands {
    Create {
        name: String,
        #[arg(long)]
        public: bool,
        /// Per-file size limit in bytes
        #[arg(long)]
        max_file_size: Option<u64>,
        /// Allowed MIME types, e.g. image/*; repeatable
        #[arg(long = "allow")]
        allowed_mime_types: Vec<String>,
    },
    List {
        #[arg(long, default_value = "text")]
        format: String,
    },
    Delete {
        name: String,
        /// Delete contained files too
        #[arg(long)]
        force: bool,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortArg {
    Name,
    Size,
    Created,
    Modified,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortField::Name,
            SortArg::Size => SortField::Size,
            SortArg::Created => SortField::Created,
            SortArg::Modified => SortField::Modified,
        }
    }
}

/// CLI execution context
pub struct CliContext {
    config: VfsConfig,
    project_id: String,
}

impl CliContext {
    /// Load configuration and fold CLI overrides into it.
    pub fn new(cli: &Cli) -> VfsResult<Self> {
        let mut config = ConfigLoader::load(cli.config.as_deref())?;
        if let Some(dir) = &cli.data_dir {
            config.storage.data_dir = Some(dir.clone());
        }
        if let Some(level) = &cli.log_level {
            config.logging.level = level.clone();
        }
        let project_id = cli
            .project
            .clone()
            .or_else(|| config.storage.default_project.clone())
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());
        Ok(Self { config, project_id })
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    fn render_config(&self) -> VfsResult<String> {
        toml::to_string_pretty(&self.config)
            .map_err(|e| VfsError::Config(format!("Failed to render configuration: {}", e)))
    }

    async fn open(&self) -> VfsResult<VfsManager> {
        let root = self.config.storage.resolve_data_dir()?;
        std::fs::create_dir_all(&root)?;
        let engine = FileStorageEngine::new(
            Arc::new(SledStoreFactory::new(root)),
            self.config.limits.clone(),
        );
        let vfs = VfsManager::new(engine, Arc::new(ExtensionMimeResolver));
        vfs.initialize(&self.project_id).await?;
        Ok(vfs)
    }

    /// Execute a CLI command
    pub async fn execute(&self, command: &Commands) -> VfsResult<String> {
        if let Commands::Config = command {
            return self.render_config();
        }
        let vfs = self.open().await?;
        let result = self.execute_inner(&vfs, command).await;
        vfs.engine().store()?.flush().await?;
        result
    }

    async fn execute_inner(&self, vfs: &VfsManager, command: &Commands) -> VfsResult<String> {
        match command {
            Commands::Put { path, file, mime } => {
                let mut options = CreateFileOptions::with_content(std::fs::read(file)?);
                options.mime_type = mime.clone();
                let record = vfs.create_file(path, options).await?;
                Ok(format!("Created {} ({})", record.path, describe(&record)))
            }
            Commands::Update { path, file } => {
                let record = vfs.update_file(path, std::fs::read(file)?).await?;
                Ok(format!("Updated {} ({})", record.path, describe(&record)))
            }
            Commands::Cat { path, output } => {
                let content = vfs.read_file_content(path).await?;
                match output {
                    Some(out) => {
                        std::fs::write(out, &content)?;
                        Ok(format!("Wrote {} bytes to {}", content.len(), out.display()))
                    }
                    None => String::from_utf8(content).map_err(|_| {
                        VfsError::Config(format!(
                            "{} is not UTF-8 text; use --output to write it to a file",
                            path
                        ))
                    }),
                }
            }
            Commands::Rm { path } => {
                if vfs.delete_file(path).await? {
                    Ok(format!("Deleted {}", path))
                } else {
                    Ok(format!("Nothing stored at {}", path))
                }
            }
            Commands::Rmdir { path, recursive } => {
                let removed = vfs.delete_directory(path, *recursive).await?;
                Ok(format!("Deleted {} files under {}", removed, path))
            }
            Commands::Mv { from, to } => {
                let record = vfs.move_file(from, to).await?;
                Ok(format!("Moved {} -> {}", from, record.path))
            }
            Commands::Ls {
                dir,
                recursive,
                sort,
                desc,
                limit,
                offset,
                format,
            } => {
                let options = ListOptions {
                    directory: dir.clone(),
                    recursive: *recursive || dir.is_none(),
                    sort_by: (*sort).into(),
                    order: if *desc { SortOrder::Desc } else { SortOrder::Asc },
                    limit: *limit,
                    offset: *offset,
                    ..ListOptions::default()
                };
                let files = vfs.list_files(options).await?;
                format_files(&files, format)
            }
            Commands::Stats { format } => {
                let stats = vfs.get_stats().await?;
                if format == "json" {
                    return to_json(&stats);
                }
                let mut lines = vec![
                    format!("Project: {}", stats.project_id),
                    format!("Files: {}", stats.total_files),
                    format!("Total size: {} bytes", stats.total_size),
                    format!(
                        "Quota used: {:.2}% of {} bytes",
                        stats.quota_usage * 100.0,
                        stats.max_storage
                    ),
                    format!("Chunked files: {}", stats.chunked_files),
                    format!("Compressed files: {}", stats.compressed_files),
                    format!("Buckets: {}", stats.bucket_count),
                ];
                if let Some(largest) = &stats.largest_file {
                    lines.push(format!("Largest file: {} ({} bytes)", largest.path, largest.size));
                }
                let out = lines.join("\n");
                Ok(out)
            }
            Commands::Bucket { command } => self.handle_bucket(vfs, command).await,
            Commands::Deploy { dir, bucket } => self.handle_deploy(vfs, dir, bucket).await,
            Commands::Gc => {
                let report = vfs.engine().cleanup_orphaned_chunks().await?;
                Ok(format!(
                    "Scanned {} chunks, removed {} orphans, {} failed",
                    report.scanned, report.removed, report.failed
                ))
            }
            Commands::Repair => {
                let metadata = vfs.engine().recompute_usage().await?;
                Ok(format!(
                    "Usage recomputed: {} files, {} bytes",
                    metadata.file_count, metadata.storage_used
                ))
            }
            Commands::Config => self.render_config(),
        }
    }

    async fn handle_bucket(&self, vfs: &VfsManager, command: &BucketCommands) -> VfsResult<String> {
        match command {
            BucketCommands::Create {
                name,
                public,
                max_file_size,
                allowed_mime_types,
            } => {
                let options = CreateBucketOptions {
                    is_public: *public,
                    max_file_size: *max_file_size,
                    allowed_mime_types: if allowed_mime_types.is_empty() {
                        None
                    } else {
                        Some(allowed_mime_types.clone())
                    },
                    ..CreateBucketOptions::default()
                };
                let bucket = vfs.create_bucket(name, options).await?;
                Ok(format!("Created bucket {}", bucket.name))
            }
            BucketCommands::List { format } => {
                let buckets = vfs.list_buckets().await?;
                format_buckets(&buckets, format)
            }
            BucketCommands::Delete { name, force, yes } => {
                if *force && !*yes {
                    use dialoguer::Confirm;
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Delete bucket '{}' and every file in it?", name))
                        .interact()
                        .map_err(|e| VfsError::Config(format!("Failed to get user input: {}", e)))?;
                    if !confirmed {
                        return Ok("Deletion cancelled".to_string());
                    }
                }
                vfs.delete_bucket(name, *force).await?;
                Ok(format!("Deleted bucket {}", name))
            }
        }
    }

    async fn handle_deploy(&self, vfs: &VfsManager, dir: &Path, bucket: &str) -> VfsResult<String> {
        if vfs.get_bucket(bucket).await?.is_none() {
            return Err(VfsError::BucketNotFound(bucket.to_string()));
        }
        let (mut created, mut updated) = (0usize, 0usize);
        for entry in walkdir::WalkDir::new(dir).follow_links(false) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(dir).map_err(|e| {
                VfsError::invalid_path(entry.path().display().to_string(), e.to_string())
            })?;
            let target = format!("{}/{}", bucket, relative.to_string_lossy());
            let content = std::fs::read(entry.path())?;
            if vfs.read_file(&target).await?.is_some() {
                vfs.update_file(&target, content).await?;
                updated += 1;
            } else {
                vfs.create_file(&target, CreateFileOptions::with_content(content))
                    .await?;
                created += 1;
            }
        }
        info!(bucket, created, updated, "Deploy finished");
        Ok(format!(
            "Deployed {} to bucket {}: {} created, {} updated",
            dir.display(),
            bucket,
            created,
            updated
        ))
    }
}

fn describe(file: &FileRecord) -> String {
    if file.is_chunked() {
        format!("{} bytes, {} chunks", file.size, file.chunk_ids().len())
    } else {
        format!("{} bytes", file.size)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> VfsResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| VfsError::Config(format!("Failed to serialize output: {}", e)))
}

fn format_files(files: &[FileRecord], format: &str) -> VfsResult<String> {
    if format == "json" {
        let rows: Vec<serde_json::Value> = files
            .iter()
            .map(|f| {
                serde_json::json!({
                    "path": f.path,
                    "size": f.size,
                    "mime_type": f.mime_type,
                    "chunked": f.is_chunked(),
                    "hash": f.hash,
                    "updated_at": f.updated_at,
                })
            })
            .collect();
        return to_json(&rows);
    }
    if files.is_empty() {
        return Ok("No files".to_string());
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Path", "Size", "MIME Type", "Chunked", "Modified"]);
    for f in files {
        table.add_row(vec![
            f.path.clone(),
            f.size.to_string(),
            f.mime_type.clone(),
            if f.is_chunked() { "yes" } else { "no" }.to_string(),
            f.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    Ok(table.to_string())
}

fn format_buckets(buckets: &[BucketRecord], format: &str) -> VfsResult<String> {
    if format == "json" {
        return to_json(&buckets);
    }
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec!["Name", "Public", "Files", "Size", "Max File Size"]);
    for b in buckets {
        table.add_row(vec![
            b.name.clone(),
            b.is_public.to_string(),
            b.file_count.to_string(),
            b.total_size.to_string(),
            b.max_file_size
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    Ok(table.to_string())
}
