//! Error types
//!
//! `StorageError` covers faults in the persistence layer and always carries the
//! collection/key it failed on. `VfsError` is the domain error raised by the
//! engine, the VFS manager and the serving facade; every variant maps to a
//! stable `code()` callers can match on.

use thiserror::Error;

/// Persistence-layer failure.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage unavailable for project {project_id}: {reason}")]
    Unavailable { project_id: String, reason: String },

    #[error("Storage backend error on {collection}/{key}: {source}")]
    Backend {
        collection: &'static str,
        key: String,
        #[source]
        source: sled::Error,
    },

    #[error("Serialization error on {collection}/{key}: {reason}")]
    Serialization {
        collection: &'static str,
        key: String,
        reason: String,
    },

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Record in {collection}/{key} has the wrong shape for that collection")]
    RecordMismatch { collection: &'static str, key: String },

    #[error("Blocking storage task failed: {0}")]
    TaskJoin(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn backend(collection: &'static str, key: impl Into<String>, source: sled::Error) -> Self {
        StorageError::Backend {
            collection,
            key: key.into(),
            source,
        }
    }

    pub(crate) fn serialization(
        collection: &'static str,
        key: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        StorageError::Serialization {
            collection,
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

/// Domain error for file, bucket, and serving operations.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Bucket not found: {0}")]
    BucketNotFound(String),

    #[error("File already exists: {0}")]
    FileAlreadyExists(String),

    #[error("Bucket already exists: {0}")]
    BucketAlreadyExists(String),

    #[error("File '{path}' is {size} bytes, exceeding the limit of {limit} bytes")]
    FileTooLarge { path: String, size: u64, limit: u64 },

    #[error("Storage quota exceeded: {used} bytes used, {requested} more requested, limit is {limit} bytes")]
    QuotaExceeded { used: u64, requested: u64, limit: u64 },

    #[error("Chunk {chunk_id} of file '{path}' is missing")]
    ChunkMissing { path: String, chunk_id: String },

    #[error("Chunk batch for '{path}' does not match the file record: {reason}")]
    ChunkMismatch { path: String, reason: String },

    #[error("MIME type {mime_type} is not allowed in bucket {bucket}")]
    MimeTypeNotAllowed { bucket: String, mime_type: String },

    #[error("Directory not empty: {path} ({files} files)")]
    DirectoryNotEmpty { path: String, files: usize },

    #[error("Bucket not empty: {name} ({files} files)")]
    BucketNotEmpty { name: String, files: usize },

    #[error("Project switch in progress (target: {target})")]
    SwitchInProgress { target: String },

    #[error("No project initialized")]
    NotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type VfsResult<T> = Result<T, VfsError>;

impl VfsError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            VfsError::InvalidPath { .. } => "INVALID_PATH",
            VfsError::InvalidName { .. } => "INVALID_NAME",
            VfsError::FileNotFound(_) => "FILE_NOT_FOUND",
            VfsError::DirectoryNotFound(_) => "DIRECTORY_NOT_FOUND",
            VfsError::BucketNotFound(_) => "BUCKET_NOT_FOUND",
            VfsError::FileAlreadyExists(_) => "FILE_ALREADY_EXISTS",
            VfsError::BucketAlreadyExists(_) => "BUCKET_ALREADY_EXISTS",
            VfsError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            VfsError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            VfsError::ChunkMissing { .. } => "CHUNK_MISSING",
            VfsError::ChunkMismatch { .. } => "CHUNK_MISMATCH",
            VfsError::MimeTypeNotAllowed { .. } => "MIME_TYPE_NOT_ALLOWED",
            VfsError::DirectoryNotEmpty { .. } => "DIRECTORY_NOT_EMPTY",
            VfsError::BucketNotEmpty { .. } => "BUCKET_NOT_EMPTY",
            VfsError::SwitchInProgress { .. } => "SWITCH_IN_PROGRESS",
            VfsError::NotInitialized => "NOT_INITIALIZED",
            VfsError::Config(_) => "CONFIG_ERROR",
            VfsError::Io(_) => "IO_ERROR",
            VfsError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether retrying an idempotent operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VfsError::Storage(_))
    }

    /// Policy-limit violations the caller can act on (shrink the file, free space).
    pub fn is_limit_violation(&self) -> bool {
        matches!(
            self,
            VfsError::FileTooLarge { .. }
                | VfsError::QuotaExceeded { .. }
                | VfsError::MimeTypeNotAllowed { .. }
        )
    }

    pub(crate) fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        VfsError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        VfsError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl From<config::ConfigError> for VfsError {
    fn from(err: config::ConfigError) -> Self {
        VfsError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(VfsError::FileNotFound("a".into()).code(), "FILE_NOT_FOUND");
        assert_eq!(
            VfsError::QuotaExceeded {
                used: 1,
                requested: 2,
                limit: 2
            }
            .code(),
            "QUOTA_EXCEEDED"
        );
        assert_eq!(VfsError::NotInitialized.code(), "NOT_INITIALIZED");
    }

    #[test]
    fn test_storage_errors_are_retryable() {
        let err: VfsError = StorageError::Transaction("conflict".into()).into();
        assert!(err.is_retryable());
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(!VfsError::FileAlreadyExists("x".into()).is_retryable());
    }

    #[test]
    fn test_limit_message_carries_limit() {
        let err = VfsError::FileTooLarge {
            path: "public/a.bin".into(),
            size: 11,
            limit: 10,
        };
        assert!(err.is_limit_violation());
        assert!(err.to_string().contains("10 bytes"));
    }
}
