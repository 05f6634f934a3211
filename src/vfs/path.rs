//! Logical path normalization.
//!
//! A normalized path is NFC and slash-separated. It has no leading or
//! trailing slash, and no blank, `.` or `..` segments. Segments are trimmed.

use crate::error::{VfsError, VfsResult};
use unicode_normalization::UnicodeNormalization;

/// Normalize a path that must name something (a file).
pub fn normalize_path(raw: &str) -> VfsResult<String> {
    let normalized = normalize_prefix(raw)?;
    if normalized.is_empty() {
        return Err(VfsError::invalid_path(raw, "path cannot be empty"));
    }
    Ok(normalized)
}

/// Normalize a directory prefix; the empty string (project root) is allowed.
pub fn normalize_prefix(raw: &str) -> VfsResult<String> {
    let nfc: String = raw.nfc().collect();
    let unified = nfc.replace('\\', "/");

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment.trim() {
            "" => continue,
            "." | ".." => {
                return Err(VfsError::invalid_path(
                    raw,
                    format!("relative segment '{}' is not allowed", segment),
                ))
            }
            s if s.chars().any(|c| c.is_control()) => {
                return Err(VfsError::invalid_path(raw, "control characters are not allowed"))
            }
            s => segments.push(s),
        }
    }
    Ok(segments.join("/"))
}

/// Split a normalized path into `(directory, name)`.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((directory, name)) => (directory, name),
        None => ("", path),
    }
}

/// First segment of a normalized path; names the bucket the file lives in.
pub fn first_segment(path: &str) -> &str {
    path.split('/').next().unwrap_or(path)
}

/// Join a bucket name and a bucket-relative path, normalizing the result.
pub fn join(bucket: &str, relative: &str) -> VfsResult<String> {
    normalize_path(&format!("{}/{}", bucket, relative))
}
