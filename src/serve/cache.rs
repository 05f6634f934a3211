//! Validators and cache lifetimes for served files.

use crate::config::ServingConfig;
use crate::mime::is_compressible;
use crate::types::FileRecord;
use chrono::{DateTime, Utc};

/// Strong entity tag from the content checksum.
pub fn entity_tag(file: &FileRecord) -> String {
    if file.hash.is_empty() {
        return format!("\"{}-{}\"", file.id, file.size);
    }
    format!("\"{}\"", file.hash)
}

/// HTTP `IMF-fixdate`, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(ts: &DateTime<Utc>) -> String {
    ts.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Whether an `If-None-Match` header matches `etag` (weak comparison).
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    let bare = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let etag = bare(etag);
    if_none_match
        .split(',')
        .any(|candidate| candidate.trim() == "*" || bare(candidate) == etag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Revalidate every time
    NoCache,
    MaxAge(u64),
}

impl CachePolicy {
    /// Compressible (text-like) types get the short window, everything else the long one.
    pub fn for_mime(mime_type: &str, config: &ServingConfig) -> Self {
        if is_compressible(mime_type) {
            CachePolicy::MaxAge(config.short_cache_secs)
        } else {
            CachePolicy::MaxAge(config.long_cache_secs)
        }
    }

    pub fn header_value(&self) -> String {
        match self {
            CachePolicy::NoCache => "no-cache".to_string(),
            CachePolicy::MaxAge(secs) => format!("public, max-age={}", secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_http_date_format() {
        let ts = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(&ts), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_etag_matching() {
        assert!(etag_matches("\"abc\"", "\"abc\""));
        assert!(etag_matches("W/\"abc\", \"def\"", "\"abc\""));
        assert!(etag_matches("*", "\"abc\""));
        assert!(!etag_matches("\"abd\"", "\"abc\""));
    }

    #[test]
    fn test_policy_by_mime() {
        let config = ServingConfig::default();
        assert_eq!(
            CachePolicy::for_mime("text/css", &config),
            CachePolicy::MaxAge(300)
        );
        assert_eq!(
            CachePolicy::for_mime("image/png", &config).header_value(),
            "public, max-age=31536000"
        );
        assert_eq!(CachePolicy::NoCache.header_value(), "no-cache");
    }
}
