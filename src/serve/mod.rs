//! Serving Facade
//!
//! Turns VFS operations into byte-range and cache aware outcomes for an
//! HTTP-style caller. Status codes are suggestions; the adaptor owns the wire.

pub mod cache;
pub mod range;

use crate::config::ServingConfig;
use crate::engine::ListOptions;
use crate::error::{VfsError, VfsResult};
use crate::types::FileRecord;
use crate::vfs::{path, CreateFileOptions, VfsManager};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub use cache::{entity_tag, etag_matches, http_date, CachePolicy};
pub use range::{parse_range, unsatisfied_range, ByteRange, RangeSpec};

/// Body served when no application has been deployed
pub const PLACEHOLDER_HTML: &str = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>No application deployed</title></head>\n<body><h1>No application deployed</h1><p>Deploy an application to this project to see it here.</p></body>\n</html>\n";

/// Request-side inputs for `serve_file_with`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServeRequest {
    /// Raw `Range` header
    pub range: Option<String>,
    /// Raw `If-None-Match` header
    pub if_none_match: Option<String>,
}

/// Representation metadata for a served file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeHeaders {
    pub content_type: String,
    /// Full resource size
    pub size: u64,
    pub etag: String,
    pub last_modified: String,
    pub cache_control: String,
}

impl ServeHeaders {
    fn for_file(file: &FileRecord, policy: CachePolicy) -> Self {
        Self {
            content_type: file.mime_type.clone(),
            size: file.size,
            etag: entity_tag(file),
            last_modified: http_date(&file.updated_at),
            cache_control: policy.header_value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServeOutcome {
    Full {
        body: Vec<u8>,
        headers: ServeHeaders,
    },
    Partial {
        body: Vec<u8>,
        range: ByteRange,
        /// `Content-Range` value
        content_range: String,
        headers: ServeHeaders,
    },
    NotModified {
        headers: ServeHeaders,
    },
    NotFound,
    /// Carries the resource size for a `Content-Range: bytes */<size>` hint
    RangeNotSatisfiable {
        size: u64,
    },
}

impl ServeOutcome {
    pub fn status(&self) -> u16 {
        match self {
            ServeOutcome::Full { .. } => 200,
            ServeOutcome::Partial { .. } => 206,
            ServeOutcome::NotModified { .. } => 304,
            ServeOutcome::NotFound => 404,
            ServeOutcome::RangeNotSatisfiable { .. } => 416,
        }
    }

    pub fn body(&self) -> &[u8] {
        match self {
            ServeOutcome::Full { body, .. } | ServeOutcome::Partial { body, .. } => body,
            _ => &[],
        }
    }

    pub fn headers(&self) -> Option<&ServeHeaders> {
        match self {
            ServeOutcome::Full { headers, .. }
            | ServeOutcome::Partial { headers, .. }
            | ServeOutcome::NotModified { headers } => Some(headers),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Created(FileRecord),
    /// A file already exists at the target path
    Conflict { path: String },
}

/// One entry of a bucket listing; `path` is relative to the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageListing {
    pub id: String,
    pub name: String,
    pub path: String,
    pub size: u64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StorageListing {
    fn from_file(bucket: &str, file: FileRecord) -> Self {
        let path = file
            .path
            .strip_prefix(bucket)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(str::to_string)
            .unwrap_or_else(|| file.path.clone());
        Self {
            id: file.id,
            name: file.name,
            path,
            size: file.size,
            mime_type: file.mime_type,
            created_at: file.created_at,
            updated_at: file.updated_at,
        }
    }
}

pub struct ServingFacade {
    vfs: Arc<VfsManager>,
    config: ServingConfig,
}

impl ServingFacade {
    pub fn new(vfs: Arc<VfsManager>, config: ServingConfig) -> Self {
        Self { vfs, config }
    }

    pub fn vfs(&self) -> &Arc<VfsManager> {
        &self.vfs
    }

    pub async fn serve_file(
        &self,
        bucket: &str,
        path: &str,
        range: Option<&str>,
    ) -> VfsResult<ServeOutcome> {
        let request = ServeRequest {
            range: range.map(str::to_string),
            if_none_match: None,
        };
        self.serve_file_with(bucket, path, &request).await
    }

    pub async fn serve_file_with(
        &self,
        bucket: &str,
        path: &str,
        request: &ServeRequest,
    ) -> VfsResult<ServeOutcome> {
        let full_path = path::join(bucket, path)?;
        let Some(file) = self.vfs.read_file(&full_path).await? else {
            return Ok(ServeOutcome::NotFound);
        };
        let policy = CachePolicy::for_mime(&file.mime_type, &self.config);
        self.respond(file, policy, request).await
    }

    async fn respond(
        &self,
        file: FileRecord,
        policy: CachePolicy,
        request: &ServeRequest,
    ) -> VfsResult<ServeOutcome> {
        let headers = ServeHeaders::for_file(&file, policy);

        if let Some(if_none_match) = &request.if_none_match {
            if etag_matches(if_none_match, &headers.etag) {
                return Ok(ServeOutcome::NotModified { headers });
            }
        }

        let spec = request.range.as_deref().and_then(parse_range);
        let range = match spec {
            Some(spec) => match spec.resolve(file.size) {
                Some(range) => Some(range),
                None => {
                    debug!(path = %file.path, size = file.size, "Range not satisfiable");
                    return Ok(ServeOutcome::RangeNotSatisfiable { size: file.size });
                }
            },
            None => None,
        };

        let content = match self.vfs.read_content(&file).await {
            Ok(content) => content,
            Err(VfsError::FileNotFound(_)) => return Ok(ServeOutcome::NotFound),
            Err(e) => return Err(e),
        };
        match range {
            Some(range) => Ok(ServeOutcome::Partial {
                body: range.slice(&content).to_vec(),
                content_range: range.content_range(file.size),
                range,
                headers,
            }),
            None => Ok(ServeOutcome::Full {
                body: content,
                headers,
            }),
        }
    }

    /// Create `bucket/path`. An existing file is reported as a conflict, not an error.
    pub async fn ingest_upload(
        &self,
        bucket: &str,
        path: &str,
        content: Vec<u8>,
        mime_type: Option<&str>,
    ) -> VfsResult<UploadOutcome> {
        let full_path = path::join(bucket, path)?;
        let options = CreateFileOptions {
            content,
            mime_type: mime_type.map(str::to_string),
            ..CreateFileOptions::default()
        };
        match self.vfs.create_file(&full_path, options).await {
            Ok(file) => Ok(UploadOutcome::Created(file)),
            Err(VfsError::FileAlreadyExists(path)) => Ok(UploadOutcome::Conflict { path }),
            Err(e) => Err(e),
        }
    }

    /// Files directly under `bucket/prefix`, paths relative to the bucket.
    pub async fn list_directory(
        &self,
        bucket: &str,
        prefix: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> VfsResult<Vec<StorageListing>> {
        let bucket = path::normalize_path(bucket)?;
        let prefix = path::normalize_prefix(prefix)?;
        let directory = if prefix.is_empty() {
            bucket.clone()
        } else {
            path::join(&bucket, &prefix)?
        };
        let options = ListOptions {
            limit,
            offset,
            ..ListOptions::in_directory(directory, false)
        };
        Ok(self
            .vfs
            .list_files(options)
            .await?
            .into_iter()
            .map(|file| StorageListing::from_file(&bucket, file))
            .collect())
    }

    /// Serve an app path, falling back to the SPA entry point, then to a
    /// placeholder page.
    pub async fn serve_spa_fallback(&self, path: &str) -> VfsResult<ServeOutcome> {
        let app = &self.config.app_bucket;
        let request = ServeRequest::default();

        let relative = path::normalize_prefix(path)?;
        if !relative.is_empty() {
            let outcome = self.serve_file_with(app, &relative, &request).await?;
            if outcome != ServeOutcome::NotFound {
                return Ok(outcome);
            }
        }

        let index_path = path::join(app, &self.config.spa_index)?;
        if let Some(index) = self.vfs.read_file(&index_path).await? {
            return self.respond(index, CachePolicy::NoCache, &request).await;
        }

        debug!(path, "No application deployed; serving placeholder");
        let body = PLACEHOLDER_HTML.as_bytes().to_vec();
        Ok(ServeOutcome::Full {
            headers: ServeHeaders {
                content_type: "text/html".to_string(),
                size: body.len() as u64,
                etag: format!("\"{}\"", crate::vfs::checksum(&body)),
                last_modified: http_date(&DateTime::<Utc>::default()),
                cache_control: CachePolicy::NoCache.header_value(),
            },
            body,
        })
    }
}
