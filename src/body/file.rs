//! File-typed response bodies.
//!
//! # Responsibilities
//! - Describe a file a handler wants materialized (type, encoding, name, stream)
//! - Fill in missing metadata from the filename or a clock (`normalize_file`)
//! - Layer gzip compression over the stream (`compress_gzip`)

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::body::contents::{self, Contents};
use crate::body::gzip::GzipContents;
use crate::body::mime::{self, OCTET_STREAM};

/// A response body that is streamed to disk instead of inlined.
///
/// The stream is owned by the `File` until the transport consumes it; after
/// materialization the body is replaced by [`MaterializedFile`] metadata.
#[derive(Default)]
pub struct File {
    /// MIME type; derived from the filename when empty.
    pub content_type: String,
    /// Comma-separated content-encoding tokens, e.g. `"zstd, gzip"`.
    pub encoding: String,
    /// Destination path the contents are written to.
    pub filename: String,
    pub contents: Option<Box<dyn Contents>>,
}

impl File {
    pub fn new(contents: impl Contents + 'static) -> Self {
        Self {
            contents: Some(Box::new(contents)),
            ..Self::default()
        }
    }

    pub fn from_bytes(data: impl Into<bytes::Bytes>) -> Self {
        Self {
            contents: Some(contents::from_bytes(data)),
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    /// Metadata only; the stream is never serialized.
    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({
            "content_type": self.content_type,
            "encoding": self.encoding,
            "filename": self.filename,
        })
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File")
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .field("filename", &self.filename)
            .field("contents", &self.contents.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Wire body that replaces a [`File`] once it has been written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedFile {
    pub content_type: String,
    pub encoding: String,
    pub filename: String,
    /// Base64 SHA-256 of the bytes written.
    #[serde(rename = "sha256_checksum")]
    pub sha256: String,
    #[serde(serialize_with = "as_string")]
    pub size: u64,
}

fn as_string<S: Serializer>(v: &u64, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(v)
}

/// Source of the current instant used for synthesized filenames.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// Fill in empty metadata using the system clock.
pub fn normalize_file(file: File) -> File {
    normalize_file_with(file, &SystemClock)
}

/// Fill in empty content type, encoding and filename.
///
/// Content type and encoding come from the filename; a missing filename is
/// synthesized as `upload_<RFC3339>` plus extensions derived from the
/// (possibly just derived) content type and encoding.
pub fn normalize_file_with(mut file: File, clock: &dyn Clock) -> File {
    if file.content_type.is_empty() {
        file.content_type = content_type_for(&file.filename);
    }
    if file.encoding.is_empty() {
        file.encoding = encoding_for(&file.filename);
    }
    if file.filename.is_empty() {
        file.filename = synthesize_filename(&file.content_type, &file.encoding, clock.now());
    }
    file
}

/// Compress the file's stream with gzip and record the `gzip` encoding token.
pub fn compress_gzip(mut file: File) -> File {
    if file.encoding.is_empty() {
        file.encoding = "gzip".to_string();
    } else if !has_token(&file.encoding, "gzip") {
        file.encoding.push_str(", gzip");
    }
    file.contents = file
        .contents
        .take()
        .map(|c| Box::new(GzipContents::new(c)) as Box<dyn Contents>);
    file
}

fn has_token(encoding: &str, token: &str) -> bool {
    encoding.split(',').any(|t| t.trim().eq_ignore_ascii_case(token))
}

fn base_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

fn content_type_for(filename: &str) -> String {
    let mut exts: Vec<&str> = base_name(filename).split('.').skip(1).collect();
    while exts.last().is_some_and(|e| mime::encoding_by_suffix(e).is_some()) {
        exts.pop();
    }

    exts.last()
        .and_then(|ext| mime::type_by_extension(ext))
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

fn encoding_for(filename: &str) -> String {
    base_name(filename)
        .split('.')
        .skip(1)
        .filter_map(mime::encoding_by_suffix)
        .collect::<Vec<_>>()
        .join(", ")
}

fn synthesize_filename(content_type: &str, encoding: &str, now: DateTime<Utc>) -> String {
    let mut name = format!("upload_{}", now.to_rfc3339_opts(SecondsFormat::Secs, true));

    if content_type != OCTET_STREAM {
        if let Some(ext) = mime::extension_by_type(content_type) {
            name.push('.');
            name.push_str(ext);
        }
    }

    for token in encoding.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(suffix) = mime::suffix_by_encoding(token) {
            name.push('.');
            name.push_str(suffix);
        }
    }
    name
}
