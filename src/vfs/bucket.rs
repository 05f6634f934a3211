//! Bucket definitions: naming rules, creation options and partial updates.

use crate::error::{VfsError, VfsResult};
use crate::types::BucketRecord;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Buckets (re-)ensured whenever a project is bound: `(name, is_public)`.
pub const DEFAULT_BUCKETS: [(&str, bool); 4] = [
    ("public", true),
    ("private", false),
    ("app", true),
    ("edge-functions", false),
];

const MAX_BUCKET_NAME_LEN: usize = 63;

/// Options for `create_bucket`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateBucketOptions {
    #[serde(default)]
    pub is_public: bool,
    pub max_file_size: Option<u64>,
    pub allowed_mime_types: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Partial bucket update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketUpdate {
    pub is_public: Option<bool>,
    /// `Some(None)` clears the override
    pub max_file_size: Option<Option<u64>>,
    pub allowed_mime_types: Option<Option<Vec<String>>>,
    pub metadata: Option<HashMap<String, String>>,
}

impl BucketUpdate {
    pub fn apply_to(self, bucket: &mut BucketRecord) {
        if let Some(is_public) = self.is_public {
            bucket.is_public = is_public;
        }
        if let Some(max_file_size) = self.max_file_size {
            bucket.max_file_size = max_file_size;
        }
        if let Some(allowed) = self.allowed_mime_types {
            bucket.allowed_mime_types = allowed;
        }
        if let Some(metadata) = self.metadata {
            bucket.metadata = metadata;
        }
        bucket.updated_at = Utc::now();
    }
}

/// Bucket names are single path segments: lowercase ASCII letters, digits,
/// `-`, `_` and `.`, starting with a letter or digit.
pub fn validate_bucket_name(name: &str) -> VfsResult<()> {
    if name.is_empty() {
        return Err(VfsError::invalid_name(name, "bucket name cannot be empty"));
    }
    if name.len() > MAX_BUCKET_NAME_LEN {
        return Err(VfsError::invalid_name(
            name,
            format!("bucket name exceeds {} characters", MAX_BUCKET_NAME_LEN),
        ));
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return Err(VfsError::invalid_name(name, "bucket name must start with a letter or digit"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')))
    {
        return Err(VfsError::invalid_name(name, format!("character {:?} is not allowed", c)));
    }
    Ok(())
}

pub(crate) fn new_bucket(project_id: &str, name: &str, options: CreateBucketOptions) -> BucketRecord {
    let now = Utc::now();
    BucketRecord {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        project_id: project_id.to_string(),
        is_public: options.is_public,
        max_file_size: options.max_file_size,
        allowed_mime_types: options.allowed_mime_types,
        file_count: 0,
        total_size: 0,
        created_at: now,
        updated_at: now,
        metadata: options.metadata,
    }
}
