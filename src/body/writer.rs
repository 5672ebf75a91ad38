//! Materializes a stream to disk in a single pass.
//!
//! # Responsibilities
//! - Copy a stream to a destination path
//! - Compute the SHA-256 digest and byte count of exactly the bytes written
//! - Close the source and the destination on every exit path
//!
//! # Design Decisions
//! - A failed source close after a successful copy is logged, not returned
//! - A failed destination flush/sync is returned: data may not be on disk

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::body::contents::Contents;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Error type for file materialization.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    #[error("failed to open file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write contents to file: {0}")]
    Copy(#[source] std::io::Error),

    #[error("failed to close file: {0}")]
    Close(#[source] std::io::Error),

    #[error("file has no contents to write")]
    MissingContents,

    #[error("invalid filename {0:?}")]
    InvalidFilename(String),
}

/// Digest and size of a written file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Standard base64 of the SHA-256 digest.
    pub sha256: String,
    pub size: u64,
}

/// Resolve `filename` inside `dir`, refusing anything but a plain name.
pub fn destination(dir: &Path, filename: &str) -> Result<PathBuf, MaterializeError> {
    let name = Path::new(filename);
    match name.file_name() {
        Some(base) if base == name.as_os_str() => Ok(dir.join(base)),
        _ => Err(MaterializeError::InvalidFilename(filename.to_string())),
    }
}

/// Stream `contents` into `path`, truncating any existing file.
pub async fn write_file(
    mut contents: Box<dyn Contents>,
    path: impl AsRef<Path>,
) -> Result<Written, MaterializeError> {
    let path = path.as_ref();

    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(0o600);

    let mut file = match opts.open(path).await {
        Ok(f) => f,
        Err(source) => {
            close_source(&mut contents).await;
            return Err(MaterializeError::Open {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut hasher = Sha256::new();
    let mut size = 0u64;
    let mut buf = vec![0u8; COPY_BUF_SIZE];

    loop {
        let n = match contents.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                close_source(&mut contents).await;
                return Err(MaterializeError::Copy(e));
            }
        };

        if let Err(e) = file.write_all(&buf[..n]).await {
            close_source(&mut contents).await;
            return Err(MaterializeError::Copy(e));
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }

    close_source(&mut contents).await;

    file.flush().await.map_err(MaterializeError::Close)?;
    file.sync_all().await.map_err(MaterializeError::Close)?;
    drop(file);

    tracing::debug!(path = %path.display(), size, "File materialized");

    Ok(Written {
        sha256: STANDARD.encode(hasher.finalize()),
        size,
    })
}

async fn close_source(contents: &mut Box<dyn Contents>) {
    if let Err(e) = contents.close().await {
        tracing::error!(err = %e, "Failed to close file contents");
    }
}
