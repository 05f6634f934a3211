//! Core records for the project-scoped file store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Project identifier; one sled database per project.
pub type ProjectId = String;

/// FileId: random UUID assigned on first write to a path
pub type FileId = String;

/// ChunkId: `<file_id>:<sequence>` with a zero-padded sequence
pub type ChunkId = String;

/// Current on-disk schema version of the project metadata record.
pub const SCHEMA_VERSION: u32 = 1;

/// Compression tag recorded alongside content. The store never transforms
/// bytes itself; the tag describes what the writer handed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Brotli,
}

/// Transfer encoding tag of the stored bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Raw,
    Base64,
}

/// Where a file's bytes live: inline in the file record, or in an ordered chunk set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileContent {
    Inline(Vec<u8>),
    Chunked(Vec<ChunkId>),
}

/// File record keyed by normalized path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub project_id: ProjectId,
    /// Normalized path, no leading or trailing slash
    pub path: String,
    /// Last path segment
    pub name: String,
    /// Path minus name; empty for files at the root
    pub directory: String,
    pub mime_type: String,
    /// Logical size in bytes
    pub size: u64,
    pub content: FileContent,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub encoding: ContentEncoding,
    /// BLAKE3 checksum of the content, hex encoded
    pub hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn is_chunked(&self) -> bool {
        matches!(self.content, FileContent::Chunked(_))
    }

    /// Chunk ids in sequence order; empty for inline files.
    pub fn chunk_ids(&self) -> &[ChunkId] {
        match &self.content {
            FileContent::Chunked(ids) => ids,
            FileContent::Inline(_) => &[],
        }
    }

    /// Lowercased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    pub fn is_compressed(&self) -> bool {
        self.compression != Compression::None
    }
}

/// One ordered fragment of a chunked file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: ChunkId,
    pub file_id: FileId,
    /// 0-based, contiguous within a file
    pub sequence: u32,
    pub content: Vec<u8>,
    pub size: u64,
}

fn default_max_file_size() -> u64 {
    100 * 1024 * 1024
}

fn default_max_storage() -> u64 {
    1024 * 1024 * 1024
}

fn default_chunk_threshold() -> u64 {
    1024 * 1024
}

fn default_chunk_size() -> u64 {
    64 * 1024
}

/// Per-project limits and chunking policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Largest single file accepted, in bytes
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Project-wide quota, in bytes
    #[serde(default = "default_max_storage")]
    pub max_storage: u64,

    /// Files strictly larger than this are chunked
    #[serde(default = "default_chunk_threshold")]
    pub chunk_threshold: u64,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    #[serde(default)]
    pub compression: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_size(),
            max_storage: default_max_storage(),
            chunk_threshold: default_chunk_threshold(),
            chunk_size: default_chunk_size(),
            compression: false,
        }
    }
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be greater than zero".to_string());
        }
        if self.chunk_size > u32::MAX as u64 {
            return Err(format!("chunk_size {} is too large", self.chunk_size));
        }
        if self.max_file_size > self.max_storage {
            return Err(format!(
                "max_file_size ({}) cannot exceed max_storage ({})",
                self.max_file_size, self.max_storage
            ));
        }
        Ok(())
    }

    /// Chunking decision for content of the given length.
    pub fn should_chunk(&self, len: u64) -> bool {
        len > self.chunk_threshold
    }
}

/// Aggregate usage for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_id: ProjectId,
    pub storage_used: u64,
    pub file_count: u64,
    pub last_modified: DateTime<Utc>,
    pub config: ProjectConfig,
    pub schema_version: u32,
}

impl ProjectMetadata {
    pub fn new(project_id: impl Into<ProjectId>, config: ProjectConfig) -> Self {
        Self {
            project_id: project_id.into(),
            storage_used: 0,
            file_count: 0,
            last_modified: Utc::now(),
            config,
            schema_version: SCHEMA_VERSION,
        }
    }

    /// Apply a size delta and file-count delta; never drops below zero.
    pub fn apply_delta(&mut self, size_delta: i128, count_delta: i64) {
        let used = self.storage_used as i128 + size_delta;
        self.storage_used = used.clamp(0, u64::MAX as i128) as u64;
        if count_delta >= 0 {
            self.file_count = self.file_count.saturating_add(count_delta as u64);
        } else {
            self.file_count = self.file_count.saturating_sub(count_delta.unsigned_abs());
        }
        self.last_modified = Utc::now();
    }

    /// Fraction of the quota in use, 0.0 when the quota is zero.
    pub fn quota_usage(&self) -> f64 {
        if self.config.max_storage == 0 {
            return 0.0;
        }
        self.storage_used as f64 / self.config.max_storage as f64
    }
}

/// Named partition of the path namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRecord {
    pub id: String,
    /// Unique within a project; also the first path segment of its files
    pub name: String,
    pub project_id: ProjectId,
    pub is_public: bool,
    pub max_file_size: Option<u64>,
    pub allowed_mime_types: Option<Vec<String>>,
    pub file_count: u64,
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl BucketRecord {
    /// Check a MIME type against the allow-list. Entries ending in `/*` match a
    /// whole top-level type.
    pub fn allows_mime_type(&self, mime_type: &str) -> bool {
        let Some(allowed) = &self.allowed_mime_types else {
            return true;
        };
        let mime_type = mime_type.to_ascii_lowercase();
        allowed.iter().any(|entry| {
            let entry = entry.to_ascii_lowercase();
            match entry.strip_suffix("/*") {
                Some(top) => mime_type
                    .split_once('/')
                    .map(|(t, _)| t == top)
                    .unwrap_or(false),
                None => entry == mime_type || entry == "*/*",
            }
        })
    }
}
