//! Fixed extension ↔ MIME and encoding ↔ suffix tables.
//!
//! # Design Decisions
//! - Tables are ordered; reverse lookups take the first matching entry so
//!   the result never depends on hash or system iteration order
//! - Content types are compared by essence (`type/subtype`), parameters ignored

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extension (without dot) → content type. Earlier entries win reverse lookups.
const EXTENSIONS: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("jsonld", "application/ld+json"),
    ("jsonnet", "application/jsonnet"),
    ("yaml", "text/yaml; charset=utf-8"),
    ("yml", "text/yaml; charset=utf-8"),
    ("toml", "application/toml"),
    ("txt", "text/plain; charset=utf-8"),
    ("csv", "text/csv; charset=utf-8"),
    ("html", "text/html; charset=utf-8"),
    ("htm", "text/html; charset=utf-8"),
    ("css", "text/css; charset=utf-8"),
    ("js", "text/javascript; charset=utf-8"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("xml", "application/xml"),
    ("md", "text/markdown; charset=utf-8"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("tar", "application/x-tar"),
    ("wasm", "application/wasm"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("svg", "image/svg+xml"),
];

/// Content-encoding token → filename suffix (without dot).
const ENCODINGS: &[(&str, &str)] = &[("gzip", "gz"), ("br", "br"), ("zstd", "zst")];

/// Aliases accepted when turning an encoding back into a suffix.
const ENCODING_ALIASES: &[(&str, &str)] = &[("brotli", "br")];

/// Content type registered for an extension.
pub fn type_by_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.').to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
}

/// Preferred extension for a content type.
pub fn extension_by_type(content_type: &str) -> Option<&'static str> {
    let wanted = essence(content_type);
    EXTENSIONS
        .iter()
        .find(|(_, ct)| essence(ct) == wanted)
        .map(|(e, _)| *e)
}

/// Encoding token named by a filename suffix.
pub fn encoding_by_suffix(suffix: &str) -> Option<&'static str> {
    ENCODINGS
        .iter()
        .find(|(_, s)| *s == suffix)
        .map(|(enc, _)| *enc)
}

/// Filename suffix for an encoding token.
pub fn suffix_by_encoding(encoding: &str) -> Option<&'static str> {
    ENCODINGS
        .iter()
        .chain(ENCODING_ALIASES)
        .find(|(enc, _)| *enc == encoding)
        .map(|(_, s)| *s)
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
