//! File Storage Engine
//!
//! Authoritative owner of file, chunk and project-metadata consistency. The
//! file record and its chunk batch are committed together in one store
//! transaction; the usage counters are updated after that commit, so a reader
//! may briefly see content ahead of the counters but never the reverse.
//!
//! Mutations run one at a time under the engine's write lock: the lookup of
//! the current record, validation against the counters, the commit and the
//! counter update form one critical section.

pub mod chunks;
pub mod query;
pub mod validation;

use crate::error::{VfsError, VfsResult};
use crate::store::{Collection, IndexFilter, IndexName, Record, Store, StoreFactory, WriteOp};
use crate::types::{ChunkRecord, FileContent, FileRecord, ProjectConfig, ProjectMetadata};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub use chunks::{assemble, chunk_id, create_chunks};
pub use query::{ListOptions, SortField, SortOrder};
pub use validation::{validate_save, SaveContext, ValidationRule};

/// Outcome of an orphaned-chunk sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Chunks examined
    pub scanned: usize,
    /// Chunk ids still referenced by some file
    pub referenced: usize,
    /// Orphans deleted by this sweep
    pub removed: usize,
    /// Orphans whose deletion failed; left for the next sweep
    pub failed: usize,
}

/// How `save_file` treats a record already stored at the path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Fail with `FileAlreadyExists` if the path is taken
    Create,
    /// Fail with `FileNotFound` if the path is free
    Update,
    /// Replace whatever is there
    Upsert,
}

pub struct FileStorageEngine {
    factory: Arc<dyn StoreFactory>,
    defaults: ProjectConfig,
    store: RwLock<Option<Arc<dyn Store>>>,
    /// Serializes file mutations together with the usage counters
    write_lock: Mutex<()>,
}

impl FileStorageEngine {
    pub fn new(factory: Arc<dyn StoreFactory>, defaults: ProjectConfig) -> Self {
        Self {
            factory,
            defaults,
            store: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    /// Bind to a project, creating its metadata record on first use.
    ///
    /// Re-initializing with the bound project id is a no-op.
    pub async fn initialize(&self, project_id: &str) -> VfsResult<ProjectMetadata> {
        if let Some(store) = self.current_store() {
            if store.project_id() == project_id {
                return self.metadata().await;
            }
        }

        let store = self.factory.open(project_id).await?;
        let metadata = match store.get_metadata().await? {
            Some(existing) => existing,
            None => {
                let metadata = ProjectMetadata::new(project_id, self.defaults.clone());
                store.put_metadata(metadata.clone()).await?;
                info!(project_id, "Created project metadata");
                metadata
            }
        };
        *self.store.write() = Some(store);
        debug!(project_id, storage_used = metadata.storage_used, "Engine bound to project");
        Ok(metadata)
    }

    fn current_store(&self) -> Option<Arc<dyn Store>> {
        self.store.read().clone()
    }

    /// Store handle of the bound project.
    pub fn store(&self) -> VfsResult<Arc<dyn Store>> {
        self.current_store().ok_or(VfsError::NotInitialized)
    }

    pub fn project_id(&self) -> Option<String> {
        self.current_store().map(|s| s.project_id().to_string())
    }

    /// Project metadata, recreated with defaults if it went missing.
    pub async fn metadata(&self) -> VfsResult<ProjectMetadata> {
        self.metadata_of(&self.store()?).await
    }

    async fn metadata_of(&self, store: &Arc<dyn Store>) -> VfsResult<ProjectMetadata> {
        match store.get_metadata().await? {
            Some(metadata) => Ok(metadata),
            None => {
                let metadata = ProjectMetadata::new(store.project_id(), self.defaults.clone());
                store.put_metadata(metadata.clone()).await?;
                Ok(metadata)
            }
        }
    }

    pub async fn update_config(&self, config: ProjectConfig) -> VfsResult<ProjectMetadata> {
        config.validate().map_err(VfsError::Config)?;
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        let mut metadata = self.metadata_of(&store).await?;
        metadata.config = config;
        metadata.last_modified = chrono::Utc::now();
        store.put_metadata(metadata.clone()).await?;
        info!(project_id = store.project_id(), "Updated project config");
        Ok(metadata)
    }

    /// Validate, then persist a file record and (optionally) its chunk batch.
    ///
    /// Any chunk batch previously stored for the file id is replaced. With
    /// `SaveMode::Upsert`, calling again with the same arguments is safe.
    pub async fn save_file(
        &self,
        file: FileRecord,
        chunks: Option<Vec<ChunkRecord>>,
        mode: SaveMode,
    ) -> VfsResult<FileRecord> {
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        let existing = store.get_file(&file.path).await?;
        match (mode, &existing) {
            (SaveMode::Create, Some(_)) => return Err(VfsError::FileAlreadyExists(file.path)),
            (SaveMode::Update, None) => return Err(VfsError::FileNotFound(file.path)),
            _ => {}
        }
        let metadata = self.metadata_of(&store).await?;

        validate_save(&SaveContext {
            file: &file,
            chunks: chunks.as_deref(),
            existing: existing.as_ref(),
            metadata: &metadata,
        })?;

        let mut ops = Vec::new();
        let keep_existing_chunks = chunks.is_none() && file.is_chunked();
        if !keep_existing_chunks {
            let mut stale: BTreeSet<String> = BTreeSet::new();
            if let Some(old) = &existing {
                stale.extend(old.chunk_ids().iter().cloned());
            }
            stale.extend(
                store
                    .list_keys(
                        Collection::Chunks,
                        Some(IndexFilter::new(IndexName::FileId, file.id.clone())),
                    )
                    .await?,
            );
            ops.extend(
                stale
                    .into_iter()
                    .map(|key| WriteOp::delete(Collection::Chunks, key)),
            );
        }
        let chunk_count = chunks.as_ref().map(|c| c.len()).unwrap_or(0);
        if let Some(batch) = chunks {
            ops.extend(
                batch
                    .into_iter()
                    .map(|chunk| WriteOp::put(chunk.id.clone(), Record::Chunk(chunk))),
            );
        }
        ops.push(WriteOp::put(file.path.clone(), Record::File(file.clone())));

        store.apply(ops).await?;

        let old_size = existing.as_ref().map(|f| f.size).unwrap_or(0);
        let size_delta = file.size as i128 - old_size as i128;
        let count_delta = if existing.is_some() { 0 } else { 1 };
        self.adjust_usage(&store, size_delta, count_delta).await?;

        debug!(
            project_id = store.project_id(),
            path = %file.path,
            size = file.size,
            chunks = chunk_count,
            "Saved file"
        );
        Ok(file)
    }

    /// Caller holds `write_lock`.
    async fn adjust_usage(
        &self,
        store: &Arc<dyn Store>,
        size_delta: i128,
        count_delta: i64,
    ) -> VfsResult<()> {
        if size_delta == 0 && count_delta == 0 {
            return Ok(());
        }
        let mut metadata = match store.get_metadata().await? {
            Some(m) => m,
            None => ProjectMetadata::new(store.project_id(), self.defaults.clone()),
        };
        metadata.apply_delta(size_delta, count_delta);
        store.put_metadata(metadata).await?;
        Ok(())
    }

    pub async fn load_file(&self, path: &str) -> VfsResult<Option<FileRecord>> {
        Ok(self.store()?.get_file(path).await?)
    }

    /// Full content of the file at `path`.
    pub async fn load_file_content(&self, path: &str) -> VfsResult<Vec<u8>> {
        let file = self
            .load_file(path)
            .await?
            .ok_or_else(|| VfsError::FileNotFound(path.to_string()))?;
        self.load_content(&file).await
    }

    /// Content for an already loaded record.
    pub async fn load_content(&self, file: &FileRecord) -> VfsResult<Vec<u8>> {
        match &file.content {
            FileContent::Inline(bytes) => Ok(bytes.clone()),
            FileContent::Chunked(_) => {
                let fetched = self.store()?.chunks_for_file(&file.id).await?;
                assemble(file, fetched)
            }
        }
    }

    /// Remove a file and its chunks. Returns the removed record, `None` if
    /// nothing was stored at `path`.
    pub async fn delete_file(&self, path: &str) -> VfsResult<Option<FileRecord>> {
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        let Some(file) = store.get_file(path).await? else {
            return Ok(None);
        };

        let mut ops: Vec<WriteOp> = file
            .chunk_ids()
            .iter()
            .map(|id| WriteOp::delete(Collection::Chunks, id.clone()))
            .collect();
        ops.push(WriteOp::delete(Collection::Files, path));
        store.apply(ops).await?;

        self.adjust_usage(&store, -(file.size as i128), -1).await?;
        debug!(project_id = store.project_id(), path, size = file.size, "Deleted file");
        Ok(Some(file))
    }

    /// Move a record to a new path; id and chunk set stay the same.
    pub async fn rename_file(&self, from: &str, to: &str) -> VfsResult<FileRecord> {
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        let file = store
            .get_file(from)
            .await?
            .ok_or_else(|| VfsError::FileNotFound(from.to_string()))?;
        if from == to {
            return Ok(file);
        }
        if store.get_file(to).await?.is_some() {
            return Err(VfsError::FileAlreadyExists(to.to_string()));
        }
        let mut moved = file;
        moved.path = to.to_string();
        let (directory, name) = match to.rsplit_once('/') {
            Some((dir, name)) => (dir.to_string(), name.to_string()),
            None => (String::new(), to.to_string()),
        };
        moved.directory = directory;
        moved.name = name;
        moved.updated_at = chrono::Utc::now();

        store
            .apply(vec![
                WriteOp::delete(Collection::Files, from),
                WriteOp::put(to, Record::File(moved.clone())),
            ])
            .await?;
        debug!(project_id = store.project_id(), from, to, "Renamed file");
        Ok(moved)
    }

    /// Filter, sort and paginate the file collection.
    pub async fn list_files(&self, options: &ListOptions) -> VfsResult<Vec<FileRecord>> {
        let files = self.store()?.list_files(options.index_filter()).await?;
        Ok(options.apply(files))
    }

    /// Delete every chunk no file references.
    ///
    /// Runs under the write lock, and chunk keys are listed before files, so a
    /// chunk committed alongside its file is never a candidate. Individual
    /// deletion failures are logged and counted; the sweep carries on.
    pub async fn cleanup_orphaned_chunks(&self) -> VfsResult<CleanupReport> {
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        let chunk_keys = store.list_keys(Collection::Chunks, None).await?;
        let referenced: HashSet<String> = store
            .list_files(None)
            .await?
            .iter()
            .flat_map(|f| f.chunk_ids().iter().cloned())
            .collect();

        let mut report = CleanupReport {
            scanned: chunk_keys.len(),
            referenced: referenced.len(),
            ..CleanupReport::default()
        };
        for key in chunk_keys {
            if referenced.contains(&key) {
                continue;
            }
            match store.delete(Collection::Chunks, &key).await {
                Ok(_) => report.removed += 1,
                Err(e) => {
                    warn!(
                        project_id = store.project_id(),
                        chunk_id = %key,
                        error = %e,
                        "Failed to delete orphaned chunk"
                    );
                    report.failed += 1;
                }
            }
        }
        info!(
            project_id = store.project_id(),
            scanned = report.scanned,
            removed = report.removed,
            failed = report.failed,
            "Orphaned chunk sweep finished"
        );
        Ok(report)
    }

    /// Rebuild usage counters from the file collection.
    pub async fn recompute_usage(&self) -> VfsResult<ProjectMetadata> {
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        let files = store.list_files(None).await?;
        let mut metadata = match store.get_metadata().await? {
            Some(m) => m,
            None => ProjectMetadata::new(store.project_id(), self.defaults.clone()),
        };
        let storage_used: u64 = files.iter().map(|f| f.size).sum();
        if metadata.storage_used != storage_used || metadata.file_count != files.len() as u64 {
            warn!(
                project_id = store.project_id(),
                recorded = metadata.storage_used,
                actual = storage_used,
                "Usage counters drifted; repairing"
            );
        }
        metadata.storage_used = storage_used;
        metadata.file_count = files.len() as u64;
        metadata.last_modified = chrono::Utc::now();
        store.put_metadata(metadata.clone()).await?;
        Ok(metadata)
    }

    /// Remove every file, chunk, bucket and the metadata record of the bound project.
    pub async fn clear_project(&self) -> VfsResult<()> {
        let store = self.store()?;
        let _guard = self.write_lock.lock().await;
        for collection in Collection::ALL {
            let removed = store.clear(collection).await?;
            debug!(
                project_id = store.project_id(),
                collection = collection.name(),
                removed,
                "Cleared collection"
            );
        }
        info!(project_id = store.project_id(), "Cleared project");
        Ok(())
    }
}
