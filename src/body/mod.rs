//! Body materialization subsystem.
//!
//! # Data Flow
//! ```text
//! Handler returns Body::File(File)
//!     → file.rs (normalize_file: content type, encoding, filename)
//!     → gzip.rs (optional: compress_gzip wraps the stream)
//!     → writer.rs (write_file: copy + SHA-256 + size in one pass)
//!     → MaterializedFile replaces the body on the wire
//! ```
//!
//! # Design Decisions
//! - Streams are never read twice; digest and size ride along the copy
//! - Whoever holds a `File` owns its stream; the writer closes it
//! - The destination path is chosen by the caller and assumed exclusive

pub mod contents;
pub mod file;
pub mod gzip;
pub mod mime;
pub mod writer;

pub use contents::{CloseError, Contents, Reader};
pub use file::{
    compress_gzip, normalize_file, normalize_file_with, Clock, File, MaterializedFile, SystemClock,
};
pub use writer::{destination, write_file, MaterializeError, Written};
