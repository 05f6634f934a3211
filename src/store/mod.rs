//! Persistent Store
//!
//! Project-scoped key/value persistence with four collections (files, chunks,
//! metadata, buckets) and secondary indexes. No business rules live here;
//! callers validate before writing.

pub mod persistence;

use crate::error::{StorageError, VfsError};
use crate::types::{BucketRecord, ChunkRecord, FileRecord, ProjectMetadata};
use async_trait::async_trait;
use std::sync::Arc;

pub use persistence::{SledStore, SledStoreFactory};

/// The four project-scoped collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Files,
    Chunks,
    Metadata,
    Buckets,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Files,
        Collection::Chunks,
        Collection::Metadata,
        Collection::Buckets,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Collection::Files => "files",
            Collection::Chunks => "chunks",
            Collection::Metadata => "metadata",
            Collection::Buckets => "buckets",
        }
    }

    /// Secondary indexes maintained for this collection.
    pub fn indexes(&self) -> &'static [IndexName] {
        match self {
            Collection::Files => &[
                IndexName::Directory,
                IndexName::MimeType,
                IndexName::CreatedAt,
                IndexName::UpdatedAt,
                IndexName::Size,
            ],
            Collection::Chunks => &[IndexName::FileId],
            Collection::Metadata => &[],
            Collection::Buckets => &[IndexName::ProjectId],
        }
    }
}

/// Secondary index names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexName {
    Directory,
    MimeType,
    CreatedAt,
    UpdatedAt,
    Size,
    FileId,
    ProjectId,
}

impl IndexName {
    pub fn name(&self) -> &'static str {
        match self {
            IndexName::Directory => "directory",
            IndexName::MimeType => "mime_type",
            IndexName::CreatedAt => "created_at",
            IndexName::UpdatedAt => "updated_at",
            IndexName::Size => "size",
            IndexName::FileId => "file_id",
            IndexName::ProjectId => "project_id",
        }
    }
}

/// Exact-match lookup on a secondary index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFilter {
    pub index: IndexName,
    pub value: String,
}

impl IndexFilter {
    pub fn new(index: IndexName, value: impl Into<String>) -> Self {
        Self {
            index,
            value: value.into(),
        }
    }
}

/// A stored record; each collection accepts exactly one variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    File(FileRecord),
    Chunk(ChunkRecord),
    Metadata(ProjectMetadata),
    Bucket(BucketRecord),
}

fn sortable_timestamp(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

impl Record {
    pub fn collection(&self) -> Collection {
        match self {
            Record::File(_) => Collection::Files,
            Record::Chunk(_) => Collection::Chunks,
            Record::Metadata(_) => Collection::Metadata,
            Record::Bucket(_) => Collection::Buckets,
        }
    }

    /// Value this record contributes to the given index, if any.
    ///
    /// Timestamps and sizes are rendered so byte order equals natural order.
    /// MIME types are indexed lowercase.
    pub fn index_value(&self, index: IndexName) -> Option<String> {
        match (self, index) {
            (Record::File(f), IndexName::Directory) => Some(f.directory.clone()),
            (Record::File(f), IndexName::MimeType) => Some(f.mime_type.to_ascii_lowercase()),
            (Record::File(f), IndexName::CreatedAt) => Some(sortable_timestamp(&f.created_at)),
            (Record::File(f), IndexName::UpdatedAt) => Some(sortable_timestamp(&f.updated_at)),
            (Record::File(f), IndexName::Size) => Some(format!("{:020}", f.size)),
            (Record::Chunk(c), IndexName::FileId) => Some(c.file_id.clone()),
            (Record::Bucket(b), IndexName::ProjectId) => Some(b.project_id.clone()),
            _ => None,
        }
    }

    pub fn into_file(self) -> Option<FileRecord> {
        match self {
            Record::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn into_chunk(self) -> Option<ChunkRecord> {
        match self {
            Record::Chunk(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_metadata(self) -> Option<ProjectMetadata> {
        match self {
            Record::Metadata(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_bucket(self) -> Option<BucketRecord> {
        match self {
            Record::Bucket(b) => Some(b),
            _ => None,
        }
    }
}

/// One mutation inside an atomic batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    Put { key: String, record: Record },
    Delete { collection: Collection, key: String },
}

impl WriteOp {
    pub fn put(key: impl Into<String>, record: Record) -> Self {
        WriteOp::Put {
            key: key.into(),
            record,
        }
    }

    pub fn delete(collection: Collection, key: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection,
            key: key.into(),
        }
    }
}

/// Handle onto one project's persisted state.
#[async_trait]
pub trait Store: Send + Sync {
    fn project_id(&self) -> &str;

    async fn put(&self, key: &str, record: Record) -> Result<(), StorageError>;

    async fn get(&self, collection: Collection, key: &str) -> Result<Option<Record>, StorageError>;

    /// Remove a record, returning what was stored.
    async fn delete(&self, collection: Collection, key: &str)
        -> Result<Option<Record>, StorageError>;

    /// All records of a collection, or those matching an index value.
    async fn list(
        &self,
        collection: Collection,
        filter: Option<IndexFilter>,
    ) -> Result<Vec<Record>, StorageError>;

    /// Primary keys only; avoids loading chunk payloads during sweeps.
    async fn list_keys(
        &self,
        collection: Collection,
        filter: Option<IndexFilter>,
    ) -> Result<Vec<String>, StorageError>;

    /// Apply every op atomically: either all land or none do.
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<(), StorageError>;

    /// Drop every record (and index entry) of a collection.
    async fn clear(&self, collection: Collection) -> Result<usize, StorageError>;

    async fn flush(&self) -> Result<(), StorageError>;
}

/// Opens project-scoped stores.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Idempotent; repeated opens of the same project return the same handle.
    async fn open(&self, project_id: &str) -> Result<Arc<dyn Store>, VfsError>;
}

/// Check that a project id is safe to use as a directory name.
pub fn validate_project_id(project_id: &str) -> Result<(), VfsError> {
    if project_id.trim().is_empty() {
        return Err(VfsError::invalid_name(project_id, "project id cannot be empty"));
    }
    if project_id == "." || project_id == ".." {
        return Err(VfsError::invalid_name(project_id, "project id cannot be a relative path"));
    }
    if let Some(c) = project_id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(VfsError::invalid_name(
            project_id,
            format!("character {:?} is not allowed", c),
        ));
    }
    Ok(())
}

fn mismatch(collection: Collection, key: &str) -> StorageError {
    StorageError::RecordMismatch {
        collection: collection.name(),
        key: key.to_string(),
    }
}

/// Typed accessors over the untyped collections.
impl dyn Store {
    pub async fn get_file(&self, path: &str) -> Result<Option<FileRecord>, StorageError> {
        match self.get(Collection::Files, path).await? {
            Some(record) => record
                .into_file()
                .map(Some)
                .ok_or_else(|| mismatch(Collection::Files, path)),
            None => Ok(None),
        }
    }

    pub async fn list_files(
        &self,
        filter: Option<IndexFilter>,
    ) -> Result<Vec<FileRecord>, StorageError> {
        self.list(Collection::Files, filter)
            .await?
            .into_iter()
            .map(|r| r.into_file().ok_or_else(|| mismatch(Collection::Files, "*")))
            .collect()
    }

    pub async fn chunks_for_file(&self, file_id: &str) -> Result<Vec<ChunkRecord>, StorageError> {
        self.list(
            Collection::Chunks,
            Some(IndexFilter::new(IndexName::FileId, file_id)),
        )
        .await?
        .into_iter()
        .map(|r| r.into_chunk().ok_or_else(|| mismatch(Collection::Chunks, file_id)))
        .collect()
    }

    pub async fn get_metadata(&self) -> Result<Option<ProjectMetadata>, StorageError> {
        let key = self.project_id().to_string();
        match self.get(Collection::Metadata, &key).await? {
            Some(record) => record
                .into_metadata()
                .map(Some)
                .ok_or_else(|| mismatch(Collection::Metadata, &key)),
            None => Ok(None),
        }
    }

    pub async fn put_metadata(&self, metadata: ProjectMetadata) -> Result<(), StorageError> {
        let key = metadata.project_id.clone();
        self.put(&key, Record::Metadata(metadata)).await
    }

    pub async fn get_bucket(&self, name: &str) -> Result<Option<BucketRecord>, StorageError> {
        match self.get(Collection::Buckets, name).await? {
            Some(record) => record
                .into_bucket()
                .map(Some)
                .ok_or_else(|| mismatch(Collection::Buckets, name)),
            None => Ok(None),
        }
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketRecord>, StorageError> {
        let filter = IndexFilter::new(IndexName::ProjectId, self.project_id());
        self.list(Collection::Buckets, Some(filter))
            .await?
            .into_iter()
            .map(|r| r.into_bucket().ok_or_else(|| mismatch(Collection::Buckets, "*")))
            .collect()
    }
}
