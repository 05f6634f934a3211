//! File listing: filtering, sorting and pagination over file records.

use crate::store::{IndexFilter, IndexName};
use crate::types::FileRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    #[default]
    Name,
    Size,
    Created,
    Modified,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Options for `list_files`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Normalized directory; `None` lists the whole project
    pub directory: Option<String>,
    /// Include files in subdirectories of `directory`
    pub recursive: bool,
    /// Extension without the dot, case-insensitive
    pub extension: Option<String>,
    pub mime_type: Option<String>,
    pub sort_by: SortField,
    pub order: SortOrder,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn in_directory(directory: impl Into<String>, recursive: bool) -> Self {
        Self {
            directory: Some(directory.into()),
            recursive,
            ..Self::default()
        }
    }

    /// Narrowest index lookup that still returns a superset of the matches.
    pub(crate) fn index_filter(&self) -> Option<IndexFilter> {
        match (&self.directory, self.recursive, &self.mime_type) {
            (Some(dir), false, _) => Some(IndexFilter::new(IndexName::Directory, dir.clone())),
            (_, _, Some(mime)) => Some(IndexFilter::new(
                IndexName::MimeType,
                mime.to_ascii_lowercase(),
            )),
            _ => None,
        }
    }

    pub fn matches(&self, file: &FileRecord) -> bool {
        if let Some(dir) = &self.directory {
            let in_dir = if self.recursive {
                is_under(&file.directory, dir)
            } else {
                &file.directory == dir
            };
            if !in_dir {
                return false;
            }
        }
        if let Some(ext) = &self.extension {
            let wanted = ext.trim_start_matches('.').to_ascii_lowercase();
            if file.extension().as_deref() != Some(wanted.as_str()) {
                return false;
            }
        }
        if let Some(mime) = &self.mime_type {
            if !file.mime_type.eq_ignore_ascii_case(mime) {
                return false;
            }
        }
        true
    }

    /// Filter, sort, then paginate.
    pub fn apply(&self, files: Vec<FileRecord>) -> Vec<FileRecord> {
        let mut files: Vec<FileRecord> = files.into_iter().filter(|f| self.matches(f)).collect();
        files.sort_by(|a, b| {
            let ord = compare(a, b, self.sort_by).then_with(|| a.path.cmp(&b.path));
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        let iter = files.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// True when `directory` equals `prefix` or sits below it. The empty prefix is the root.
pub fn is_under(directory: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    directory == prefix
        || (directory.len() > prefix.len()
            && directory.starts_with(prefix)
            && directory.as_bytes()[prefix.len()] == b'/')
}

fn compare(a: &FileRecord, b: &FileRecord, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Size => a.size.cmp(&b.size),
        SortField::Created => a.created_at.cmp(&b.created_at),
        SortField::Modified => a.updated_at.cmp(&b.updated_at),
    }
}
