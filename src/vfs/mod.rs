//! Virtual File System Manager
//!
//! Domain API over the [`FileStorageEngine`]: path normalization, checksums,
//! the chunking decision, bucket lifecycle and single-active-project binding.
//!
//! One manager owns one project pointer and one bucket cache. Construct it
//! explicitly and share it by `Arc`; there is no global instance.
//!
//! File and bucket operations hold a shared gate for their whole run; a
//! project switch takes it exclusively, so no operation straddles two stores.

pub mod bucket;
pub mod path;
pub mod stats;

use crate::engine::{create_chunks, FileStorageEngine, ListOptions, SaveMode};
use crate::error::{VfsError, VfsResult};
use crate::mime::MimeTypeResolver;
use crate::store::{Collection, Record};
use crate::types::{
    BucketRecord, ChunkRecord, Compression, ContentEncoding, FileContent, FileRecord,
    ProjectConfig,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock as AsyncRwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

pub use bucket::{validate_bucket_name, BucketUpdate, CreateBucketOptions, DEFAULT_BUCKETS};
pub use path::{normalize_path, normalize_prefix};
pub use stats::{DirectoryInfo, LargestFile, VfsStats};

/// Project binding state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectState {
    Uninitialized,
    Initializing { target: String },
    Bound { project_id: String },
    Switching { from: String, to: String },
}

impl ProjectState {
    pub fn project_id(&self) -> Option<&str> {
        match self {
            ProjectState::Bound { project_id } => Some(project_id),
            _ => None,
        }
    }
}

/// Content and tags for `create_file`
#[derive(Debug, Clone, Default)]
pub struct CreateFileOptions {
    pub content: Vec<u8>,
    /// Inferred from the extension when absent
    pub mime_type: Option<String>,
    pub compression: Compression,
    pub encoding: ContentEncoding,
}

impl CreateFileOptions {
    pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// BLAKE3 checksum, hex encoded
pub fn checksum(content: &[u8]) -> String {
    hex::encode(blake3::hash(content).as_bytes())
}

/// Inline or chunked representation of `content` for the given policy.
fn layout_content(
    file_id: &str,
    content: Vec<u8>,
    config: &ProjectConfig,
) -> (FileContent, Option<Vec<ChunkRecord>>) {
    if config.should_chunk(content.len() as u64) {
        let chunks = create_chunks(&content, config.chunk_size, file_id);
        let ids = chunks.iter().map(|c| c.id.clone()).collect();
        (FileContent::Chunked(ids), Some(chunks))
    } else {
        (FileContent::Inline(content), None)
    }
}

/// Bound project of an in-flight operation; keeps switches out until dropped.
struct Operation<'a> {
    project_id: String,
    _gate: RwLockReadGuard<'a, ()>,
}

pub struct VfsManager {
    engine: FileStorageEngine,
    mime: Arc<dyn MimeTypeResolver>,
    state: Mutex<ProjectState>,
    buckets: RwLock<HashMap<String, BucketRecord>>,
    gate: AsyncRwLock<()>,
}

impl VfsManager {
    pub fn new(engine: FileStorageEngine, mime: Arc<dyn MimeTypeResolver>) -> Self {
        Self {
            engine,
            mime,
            state: Mutex::new(ProjectState::Uninitialized),
            buckets: RwLock::new(HashMap::new()),
            gate: AsyncRwLock::new(()),
        }
    }

    pub fn engine(&self) -> &FileStorageEngine {
        &self.engine
    }

    pub fn state(&self) -> ProjectState {
        self.state.lock().clone()
    }

    pub fn current_project(&self) -> Option<String> {
        self.state.lock().project_id().map(str::to_string)
    }

    /// Bind to a project. Idempotent for the bound id; a different id switches.
    pub async fn initialize(&self, project_id: &str) -> VfsResult<()> {
        let previous = {
            let mut state = self.state.lock();
            let current = state.clone();
            match current {
                ProjectState::Bound { project_id: bound } if bound == project_id => return Ok(()),
                ProjectState::Initializing { target }
                | ProjectState::Switching { to: target, .. } => {
                    return Err(VfsError::SwitchInProgress { target })
                }
                ProjectState::Uninitialized => {
                    *state = ProjectState::Initializing {
                        target: project_id.to_string(),
                    };
                    None
                }
                ProjectState::Bound { project_id: from } => {
                    *state = ProjectState::Switching {
                        from: from.clone(),
                        to: project_id.to_string(),
                    };
                    Some(from)
                }
            }
        };

        // Wait for in-flight operations on the previous project to finish.
        let _gate = self.gate.write().await;
        match self.bind(project_id).await {
            Ok(()) => {
                *self.state.lock() = ProjectState::Bound {
                    project_id: project_id.to_string(),
                };
                info!(project_id, previous = ?previous, "Project bound");
                Ok(())
            }
            Err(e) => {
                warn!(project_id, error = %e, "Project bind failed");
                self.rollback(previous).await;
                Err(e)
            }
        }
    }

    pub async fn switch_to_project(&self, project_id: &str) -> VfsResult<()> {
        self.initialize(project_id).await
    }

    async fn bind(&self, project_id: &str) -> VfsResult<()> {
        self.engine.initialize(project_id).await?;
        self.ensure_default_buckets().await?;
        self.reload_bucket_cache().await
    }

    async fn rollback(&self, previous: Option<String>) {
        let restored = match previous {
            Some(from) => match self.bind(&from).await {
                Ok(()) => ProjectState::Bound { project_id: from },
                Err(e) => {
                    warn!(project_id = %from, error = %e, "Could not restore previous project");
                    ProjectState::Uninitialized
                }
            },
            None => ProjectState::Uninitialized,
        };
        if restored == ProjectState::Uninitialized {
            self.buckets.write().clear();
        }
        *self.state.lock() = restored;
    }

    async fn ensure_default_buckets(&self) -> VfsResult<()> {
        let store = self.engine.store()?;
        for (name, is_public) in DEFAULT_BUCKETS {
            if store.get_bucket(name).await?.is_none() {
                let bucket = bucket::new_bucket(
                    store.project_id(),
                    name,
                    CreateBucketOptions {
                        is_public,
                        ..CreateBucketOptions::default()
                    },
                );
                store.put(name, Record::Bucket(bucket)).await?;
                debug!(project_id = store.project_id(), bucket = name, "Created default bucket");
            }
        }
        Ok(())
    }

    async fn reload_bucket_cache(&self) -> VfsResult<()> {
        let buckets = self.engine.store()?.list_buckets().await?;
        let mut cache = self.buckets.write();
        cache.clear();
        cache.extend(buckets.into_iter().map(|b| (b.name.clone(), b)));
        Ok(())
    }

    /// Enter a file or bucket operation. Rejects fast while a switch runs.
    async fn enter(&self) -> VfsResult<Operation<'_>> {
        self.ensure_bound()?;
        let gate = self.gate.read().await;
        Ok(Operation {
            project_id: self.ensure_bound()?,
            _gate: gate,
        })
    }

    /// Fails unless a project is bound and no switch is running.
    fn ensure_bound(&self) -> VfsResult<String> {
        match &*self.state.lock() {
            ProjectState::Bound { project_id } => Ok(project_id.clone()),
            ProjectState::Uninitialized => Err(VfsError::NotInitialized),
            ProjectState::Initializing { target } | ProjectState::Switching { to: target, .. } => {
                Err(VfsError::SwitchInProgress {
                    target: target.clone(),
                })
            }
        }
    }

    /// Size and MIME policy of the bucket a path lives in, if it lives in one.
    fn enforce_bucket_policy(&self, path: &str, size: u64, mime_type: &str) -> VfsResult<()> {
        if !path.contains('/') {
            return Ok(());
        }
        let cache = self.buckets.read();
        let Some(bucket) = cache.get(path::first_segment(path)) else {
            return Ok(());
        };
        if let Some(limit) = bucket.max_file_size {
            if size > limit {
                return Err(VfsError::FileTooLarge {
                    path: path.to_string(),
                    size,
                    limit,
                });
            }
        }
        if !bucket.allows_mime_type(mime_type) {
            return Err(VfsError::MimeTypeNotAllowed {
                bucket: bucket.name.clone(),
                mime_type: mime_type.to_string(),
            });
        }
        Ok(())
    }

    // ---- files ----

    /// Create a file; never overwrites.
    pub async fn create_file(
        &self,
        path: &str,
        options: CreateFileOptions,
    ) -> VfsResult<FileRecord> {
        let op = self.enter().await?;
        let project_id = op.project_id.clone();
        let path = normalize_path(path)?;
        if self.engine.load_file(&path).await?.is_some() {
            return Err(VfsError::FileAlreadyExists(path));
        }

        let mime_type = options
            .mime_type
            .unwrap_or_else(|| self.mime.for_path(&path));
        let size = options.content.len() as u64;
        self.enforce_bucket_policy(&path, size, &mime_type)?;

        let config = self.engine.metadata().await?.config;
        let id = uuid::Uuid::new_v4().to_string();
        let hash = checksum(&options.content);
        let (content, chunks) = layout_content(&id, options.content, &config);
        let (directory, name) = path::split_path(&path);
        let now = Utc::now();
        let file = FileRecord {
            id,
            project_id,
            path: path.clone(),
            name: name.to_string(),
            directory: directory.to_string(),
            mime_type,
            size,
            content,
            compression: options.compression,
            encoding: options.encoding,
            hash,
            created_at: now,
            updated_at: now,
        };
        self.engine.save_file(file, chunks, SaveMode::Create).await
    }

    /// Replace a file's content; the chunking decision is made afresh.
    pub async fn update_file(&self, path: &str, content: Vec<u8>) -> VfsResult<FileRecord> {
        let _op = self.enter().await?;
        let path = normalize_path(path)?;
        let existing = self
            .engine
            .load_file(&path)
            .await?
            .ok_or_else(|| VfsError::FileNotFound(path.clone()))?;

        let size = content.len() as u64;
        self.enforce_bucket_policy(&path, size, &existing.mime_type)?;

        let config = self.engine.metadata().await?.config;
        let hash = checksum(&content);
        let (layout, chunks) = layout_content(&existing.id, content, &config);
        let file = FileRecord {
            size,
            content: layout,
            hash,
            updated_at: Utc::now(),
            ..existing
        };
        self.engine.save_file(file, chunks, SaveMode::Update).await
    }

    pub async fn read_file(&self, path: &str) -> VfsResult<Option<FileRecord>> {
        let _op = self.enter().await?;
        let path = normalize_path(path)?;
        self.engine.load_file(&path).await
    }

    pub async fn read_file_content(&self, path: &str) -> VfsResult<Vec<u8>> {
        let _op = self.enter().await?;
        let path = normalize_path(path)?;
        self.engine.load_file_content(&path).await
    }

    pub async fn read_content(&self, file: &FileRecord) -> VfsResult<Vec<u8>> {
        let op = self.enter().await?;
        if file.project_id != op.project_id {
            return Err(VfsError::FileNotFound(file.path.clone()));
        }
        self.engine.load_content(file).await
    }

    /// `false` when nothing was stored at `path`.
    pub async fn delete_file(&self, path: &str) -> VfsResult<bool> {
        let _op = self.enter().await?;
        let path = normalize_path(path)?;
        Ok(self.engine.delete_file(&path).await?.is_some())
    }

    pub async fn move_file(&self, from: &str, to: &str) -> VfsResult<FileRecord> {
        let _op = self.enter().await?;
        let from = normalize_path(from)?;
        let to = normalize_path(to)?;
        let file = self
            .engine
            .load_file(&from)
            .await?
            .ok_or_else(|| VfsError::FileNotFound(from.clone()))?;
        if from == to {
            return Ok(file);
        }
        if self.engine.load_file(&to).await?.is_some() {
            return Err(VfsError::FileAlreadyExists(to));
        }
        self.enforce_bucket_policy(&to, file.size, &file.mime_type)?;
        self.engine.rename_file(&from, &to).await
    }

    pub async fn list_files(&self, mut options: ListOptions) -> VfsResult<Vec<FileRecord>> {
        let _op = self.enter().await?;
        if let Some(dir) = options.directory.take() {
            let dir = normalize_prefix(&dir)?;
            // Recursive listing of the root is a full listing.
            options.directory = if dir.is_empty() && options.recursive {
                None
            } else {
                Some(dir)
            };
        }
        self.engine.list_files(&options).await
    }

    // ---- directories ----

    async fn files_under(&self, prefix: &str) -> VfsResult<Vec<FileRecord>> {
        let options = if prefix.is_empty() {
            ListOptions::default()
        } else {
            ListOptions::in_directory(prefix, true)
        };
        self.engine.list_files(&options).await
    }

    /// Directories are implicit; this only validates the path and reports
    /// what already lives under it.
    pub async fn create_directory(&self, path: &str) -> VfsResult<DirectoryInfo> {
        let _op = self.enter().await?;
        let path = normalize_path(path)?;
        let files = self.files_under(&path).await?;
        Ok(directory_info(path, &files))
    }

    pub async fn get_directory(&self, path: &str) -> VfsResult<DirectoryInfo> {
        let _op = self.enter().await?;
        let path = normalize_prefix(path)?;
        let files = self.files_under(&path).await?;
        if files.is_empty() && !path.is_empty() {
            return Err(VfsError::DirectoryNotFound(path));
        }
        Ok(directory_info(path, &files))
    }

    /// Delete every file under `path`. Returns how many were removed.
    pub async fn delete_directory(&self, path: &str, recursive: bool) -> VfsResult<usize> {
        let _op = self.enter().await?;
        let path = normalize_path(path)?;
        let files = self.files_under(&path).await?;
        if files.is_empty() {
            return Ok(0);
        }
        if !recursive {
            return Err(VfsError::DirectoryNotEmpty {
                path,
                files: files.len(),
            });
        }
        let mut removed = 0;
        for file in files {
            if self.engine.delete_file(&file.path).await?.is_some() {
                removed += 1;
            }
        }
        info!(path = %path, removed, "Deleted directory");
        Ok(removed)
    }

    // ---- buckets ----

    pub async fn create_bucket(
        &self,
        name: &str,
        options: CreateBucketOptions,
    ) -> VfsResult<BucketRecord> {
        let op = self.enter().await?;
        let project_id = op.project_id.clone();
        validate_bucket_name(name)?;
        let store = self.engine.store()?;
        if store.get_bucket(name).await?.is_some() {
            return Err(VfsError::BucketAlreadyExists(name.to_string()));
        }
        let bucket = bucket::new_bucket(&project_id, name, options);
        store.put(name, Record::Bucket(bucket.clone())).await?;
        self.buckets.write().insert(name.to_string(), bucket.clone());
        info!(project_id = %project_id, bucket = name, "Created bucket");
        Ok(bucket)
    }

    /// Bucket with file statistics refreshed from its contents.
    pub async fn get_bucket(&self, name: &str) -> VfsResult<Option<BucketRecord>> {
        let _op = self.enter().await?;
        let Some(bucket) = self.engine.store()?.get_bucket(name).await? else {
            return Ok(None);
        };
        Ok(Some(self.refresh_bucket_stats(bucket).await?))
    }

    pub async fn list_buckets(&self) -> VfsResult<Vec<BucketRecord>> {
        let _op = self.enter().await?;
        let mut buckets = Vec::new();
        for bucket in self.engine.store()?.list_buckets().await? {
            buckets.push(self.refresh_bucket_stats(bucket).await?);
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn refresh_bucket_stats(&self, mut bucket: BucketRecord) -> VfsResult<BucketRecord> {
        let files = self.files_under(&bucket.name).await?;
        let file_count = files.len() as u64;
        let total_size = files.iter().map(|f| f.size).sum();
        if bucket.file_count != file_count || bucket.total_size != total_size {
            bucket.file_count = file_count;
            bucket.total_size = total_size;
            self.engine
                .store()?
                .put(&bucket.name, Record::Bucket(bucket.clone()))
                .await?;
            self.buckets
                .write()
                .insert(bucket.name.clone(), bucket.clone());
        }
        Ok(bucket)
    }

    pub async fn update_bucket(&self, name: &str, update: BucketUpdate) -> VfsResult<BucketRecord> {
        let _op = self.enter().await?;
        let store = self.engine.store()?;
        let mut bucket = store
            .get_bucket(name)
            .await?
            .ok_or_else(|| VfsError::BucketNotFound(name.to_string()))?;
        update.apply_to(&mut bucket);
        store.put(name, Record::Bucket(bucket.clone())).await?;
        self.buckets.write().insert(name.to_string(), bucket.clone());
        debug!(bucket = name, "Updated bucket");
        Ok(bucket)
    }

    /// Delete a bucket. Non-empty buckets need `force`, which removes their
    /// files first.
    pub async fn delete_bucket(&self, name: &str, force: bool) -> VfsResult<()> {
        let _op = self.enter().await?;
        let store = self.engine.store()?;
        if store.get_bucket(name).await?.is_none() {
            return Err(VfsError::BucketNotFound(name.to_string()));
        }
        let files = self.files_under(name).await?;
        if !files.is_empty() && !force {
            return Err(VfsError::BucketNotEmpty {
                name: name.to_string(),
                files: files.len(),
            });
        }
        for file in &files {
            self.engine.delete_file(&file.path).await?;
        }
        store.delete(Collection::Buckets, name).await?;
        self.buckets.write().remove(name);
        info!(bucket = name, files = files.len(), "Deleted bucket");
        Ok(())
    }

    // ---- stats ----

    /// Usage snapshot computed from a live listing.
    pub async fn get_stats(&self) -> VfsResult<VfsStats> {
        let _op = self.enter().await?;
        let metadata = self.engine.metadata().await?;
        let files = self.engine.list_files(&ListOptions::default()).await?;
        let bucket_count = self.engine.store()?.list_buckets().await?.len();
        Ok(VfsStats::compute(&metadata, &files, bucket_count))
    }
}

fn directory_info(path: String, files: &[FileRecord]) -> DirectoryInfo {
    DirectoryInfo {
        path,
        file_count: files.len() as u64,
        total_size: files.iter().map(|f| f.size).sum(),
    }
}
