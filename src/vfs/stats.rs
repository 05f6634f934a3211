use crate::types::{FileRecord, ProjectMetadata};
use serde::{Deserialize, Serialize};

/// Live usage snapshot, always derived from a full file listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VfsStats {
    pub project_id: String,
    pub total_files: u64,
    pub total_size: u64,
    /// Fraction of `max_storage` in use
    pub quota_usage: f64,
    pub max_storage: u64,
    pub largest_file: Option<LargestFile>,
    pub chunked_files: u64,
    pub compressed_files: u64,
    pub bucket_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestFile {
    pub path: String,
    pub size: u64,
}

/// Aggregate of the files under one directory prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub path: String,
    pub file_count: u64,
    pub total_size: u64,
}

impl VfsStats {
    pub fn compute(metadata: &ProjectMetadata, files: &[FileRecord], bucket_count: usize) -> Self {
        let total_size: u64 = files.iter().map(|f| f.size).sum();
        let largest_file = files
            .iter()
            .max_by(|a, b| a.size.cmp(&b.size).then_with(|| b.path.cmp(&a.path)))
            .map(|f| LargestFile {
                path: f.path.clone(),
                size: f.size,
            });
        let max_storage = metadata.config.max_storage;

        Self {
            project_id: metadata.project_id.clone(),
            total_files: files.len() as u64,
            total_size,
            quota_usage: if max_storage == 0 {
                0.0
            } else {
                total_size as f64 / max_storage as f64
            },
            max_storage,
            largest_file,
            chunked_files: files.iter().filter(|f| f.is_chunked()).count() as u64,
            compressed_files: files.iter().filter(|f| f.is_compressed()).count() as u64,
            bucket_count: bucket_count as u64,
        }
    }
}
