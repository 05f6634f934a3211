//! Save-time validation rules, checked in a fixed order; the first failure wins.

use super::chunks::{is_untransformed, verify_batch};
use crate::error::{VfsError, VfsResult};
use crate::types::{ChunkRecord, FileContent, FileRecord, ProjectMetadata};

/// Everything a rule may look at.
pub struct SaveContext<'a> {
    pub file: &'a FileRecord,
    pub chunks: Option<&'a [ChunkRecord]>,
    /// Record currently stored at the same path, if any
    pub existing: Option<&'a FileRecord>,
    pub metadata: &'a ProjectMetadata,
}

impl SaveContext<'_> {
    fn old_size(&self) -> u64 {
        self.existing.map(|f| f.size).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    MaxFileSize,
    NonBlankPath,
    Quota,
    ContentShape,
}

impl ValidationRule {
    pub const ORDER: [ValidationRule; 4] = [
        ValidationRule::MaxFileSize,
        ValidationRule::NonBlankPath,
        ValidationRule::Quota,
        ValidationRule::ContentShape,
    ];

    pub fn check(&self, ctx: &SaveContext<'_>) -> VfsResult<()> {
        match self {
            ValidationRule::MaxFileSize => {
                let limit = ctx.metadata.config.max_file_size;
                if ctx.file.size > limit {
                    return Err(VfsError::FileTooLarge {
                        path: ctx.file.path.clone(),
                        size: ctx.file.size,
                        limit,
                    });
                }
                Ok(())
            }
            ValidationRule::NonBlankPath => {
                if ctx.file.path.trim().is_empty() {
                    return Err(VfsError::invalid_path(&ctx.file.path, "path cannot be empty"));
                }
                Ok(())
            }
            ValidationRule::Quota => {
                let old_size = ctx.old_size();
                // Shrinking or same-size rewrites never make usage worse.
                if ctx.file.size <= old_size {
                    return Ok(());
                }
                let requested = ctx.file.size - old_size;
                let used = ctx.metadata.storage_used;
                let limit = ctx.metadata.config.max_storage;
                if used.saturating_add(requested) > limit {
                    return Err(VfsError::QuotaExceeded {
                        used,
                        requested,
                        limit,
                    });
                }
                Ok(())
            }
            ValidationRule::ContentShape => check_content_shape(ctx),
        }
    }
}

fn check_content_shape(ctx: &SaveContext<'_>) -> VfsResult<()> {
    let file = ctx.file;
    let mismatch = |reason: &str| VfsError::ChunkMismatch {
        path: file.path.clone(),
        reason: reason.to_string(),
    };

    match (&file.content, ctx.chunks) {
        (FileContent::Inline(bytes), None) => {
            if is_untransformed(file) && bytes.len() as u64 != file.size {
                return Err(mismatch("inline content length differs from size"));
            }
            Ok(())
        }
        (FileContent::Inline(_), Some(_)) => {
            Err(mismatch("inline file cannot carry a chunk batch"))
        }
        (FileContent::Chunked(_), Some(chunks)) => verify_batch(file, chunks),
        (FileContent::Chunked(ids), None) => {
            // Metadata-only rewrite: the stored chunk set must already be this one.
            match ctx.existing {
                Some(old) if old.id == file.id && old.chunk_ids() == ids.as_slice() => Ok(()),
                _ => Err(mismatch("chunked file saved without its chunk batch")),
            }
        }
    }
}

/// Run every rule in order.
pub fn validate_save(ctx: &SaveContext<'_>) -> VfsResult<()> {
    for rule in ValidationRule::ORDER {
        rule.check(ctx)?;
    }
    Ok(())
}
