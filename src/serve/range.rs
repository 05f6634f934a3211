//! Single byte-range requests.
//!
//! Parsing and resolution are separate steps: a header that does not parse is
//! ignored (full body), while one that parses but cannot be satisfied for the
//! resource size is a 416.

use serde::{Deserialize, Serialize};

/// Parsed `Range` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-` or `bytes=start-end`
    FromTo { start: u64, end: Option<u64> },
    /// `bytes=-n`: the last n bytes
    Suffix(u64),
}

/// Inclusive byte range within a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` value, e.g. `bytes 100-199/1000`
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, size)
    }

    /// Slice of `content` this range covers.
    pub fn slice<'a>(&self, content: &'a [u8]) -> &'a [u8] {
        let start = (self.start as usize).min(content.len());
        let end = (self.end as usize).saturating_add(1).min(content.len());
        &content[start..end]
    }
}

/// `Content-Range` value for a 416 response
pub fn unsatisfied_range(size: u64) -> String {
    format!("bytes */{}", size)
}

fn parse_number(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse a `Range` header. `None` means the header should be ignored.
pub fn parse_range(header: &str) -> Option<RangeSpec> {
    let header = header.trim();
    let (unit, set) = header.split_once('=')?;
    if !unit.trim().eq_ignore_ascii_case("bytes") || set.contains(',') {
        return None;
    }
    let (first, last) = set.trim().split_once('-')?;
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return parse_number(last).map(RangeSpec::Suffix);
    }
    let start = parse_number(first)?;
    let end = if last.is_empty() {
        None
    } else {
        Some(parse_number(last)?)
    };
    Some(RangeSpec::FromTo { start, end })
}

impl RangeSpec {
    /// Resolve against a resource size; `None` is not satisfiable.
    ///
    /// Explicit bounds must lie inside the resource. A suffix longer than the
    /// resource selects all of it.
    pub fn resolve(&self, size: u64) -> Option<ByteRange> {
        if size == 0 {
            return None;
        }
        let last = size - 1;
        match *self {
            RangeSpec::FromTo { start, end } => {
                if start > last {
                    return None;
                }
                let end = end.unwrap_or(last);
                if end < start || end > last {
                    return None;
                }
                Some(ByteRange { start, end })
            }
            RangeSpec::Suffix(0) => None,
            RangeSpec::Suffix(n) => Some(ByteRange {
                start: size.saturating_sub(n),
                end: last,
            }),
        }
    }
}
