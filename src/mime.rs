//! MIME type lookup by file extension.

/// Fallback for unknown or missing extensions.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Resolves a MIME type from a lowercased extension (no dot).
pub trait MimeTypeResolver: Send + Sync {
    fn resolve(&self, extension: &str) -> Option<&'static str>;

    /// Resolve from a path, falling back to `application/octet-stream`.
    fn for_path(&self, path: &str) -> String {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => self
                .resolve(&ext.to_ascii_lowercase())
                .unwrap_or(DEFAULT_MIME_TYPE)
                .to_string(),
            _ => DEFAULT_MIME_TYPE.to_string(),
        }
    }
}

/// Built-in table covering web assets, media, documents and archives.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionMimeResolver;

impl MimeTypeResolver for ExtensionMimeResolver {
    fn resolve(&self, extension: &str) -> Option<&'static str> {
        let mime = match extension {
            "html" | "htm" => "text/html",
            "css" => "text/css",
            "js" | "mjs" | "cjs" => "application/javascript",
            "json" | "map" => "application/json",
            "txt" | "text" | "log" => "text/plain",
            "md" | "markdown" => "text/markdown",
            "csv" => "text/csv",
            "xml" => "application/xml",
            "yaml" | "yml" => "application/yaml",
            "toml" => "application/toml",
            "ts" | "tsx" => "application/typescript",
            "wasm" => "application/wasm",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "avif" => "image/avif",
            "svg" => "image/svg+xml",
            "ico" => "image/x-icon",
            "bmp" => "image/bmp",
            "mp4" => "video/mp4",
            "webm" => "video/webm",
            "mov" => "video/quicktime",
            "mp3" => "audio/mpeg",
            "wav" => "audio/wav",
            "ogg" => "audio/ogg",
            "flac" => "audio/flac",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            "ttf" => "font/ttf",
            "otf" => "font/otf",
            "pdf" => "application/pdf",
            "zip" => "application/zip",
            "gz" | "gzip" => "application/gzip",
            "tar" => "application/x-tar",
            "sql" => "application/sql",
            _ => return None,
        };
        Some(mime)
    }
}

/// Text-like types that benefit from transfer compression and get a
/// short cache window.
pub fn is_compressible(mime_type: &str) -> bool {
    let mime_type = mime_type
        .split(';')
        .next()
        .unwrap_or(mime_type)
        .trim()
        .to_ascii_lowercase();
    mime_type.starts_with("text/")
        || mime_type.ends_with("+xml")
        || mime_type.ends_with("+json")
        || matches!(
            mime_type.as_str(),
            "application/javascript"
                | "application/json"
                | "application/xml"
                | "application/yaml"
                | "application/toml"
                | "application/typescript"
                | "application/sql"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_known_extensions() {
        let resolver = ExtensionMimeResolver;
        assert_eq!(resolver.for_path("public/index.HTML"), "text/html");
        assert_eq!(resolver.for_path("a/b/video.mp4"), "video/mp4");
        assert_eq!(resolver.for_path("styles.css"), "text/css");
    }

    #[test]
    fn test_falls_back_to_octet_stream() {
        let resolver = ExtensionMimeResolver;
        assert_eq!(resolver.for_path("bin/blob.unknownext"), DEFAULT_MIME_TYPE);
        assert_eq!(resolver.for_path("Makefile"), DEFAULT_MIME_TYPE);
        assert_eq!(resolver.for_path("app/.env"), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_compressible_types() {
        assert!(is_compressible("text/html; charset=utf-8"));
        assert!(is_compressible("application/json"));
        assert!(is_compressible("image/svg+xml"));
        assert!(!is_compressible("image/png"));
        assert!(!is_compressible("video/mp4"));
    }
}
