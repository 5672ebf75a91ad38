//! Readable byte streams owned by request and response bodies.
//!
//! # Design Decisions
//! - A stream is consumed once and closed explicitly; close failures are
//!   reported instead of being lost in `Drop`
//! - Aggregated failures keep every underlying error

use std::fmt;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, ReadBuf};

/// An owned, closable byte stream.
#[async_trait]
pub trait Contents: AsyncRead + Send + Unpin {
    /// Release the resources behind the stream.
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Contents for tokio::fs::File {}

#[async_trait]
impl Contents for Cursor<Bytes> {}

#[async_trait]
impl Contents for Cursor<Vec<u8>> {}

#[async_trait]
impl Contents for &'static [u8] {}

/// Wraps any async reader whose close is a no-op.
pub struct Reader<R>(R);

impl<R> Reader<R> {
    pub fn new(inner: R) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> R {
        self.0
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for Reader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

#[async_trait]
impl<R: AsyncRead + Send + Unpin> Contents for Reader<R> {}

/// Box an in-memory buffer as [`Contents`].
pub fn from_bytes(data: impl Into<Bytes>) -> Box<dyn Contents> {
    Box::new(Cursor::new(data.into()))
}

/// Every failure collected while closing a group of resources.
#[derive(Debug, Default)]
pub struct CloseError {
    errors: Vec<io::Error>,
}

impl CloseError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the failure of one resource, if any.
    pub fn push(&mut self, result: io::Result<()>) {
        if let Err(e) = result {
            self.errors.push(e);
        }
    }

    pub fn push_err(&mut self, err: io::Error) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[io::Error] {
        &self.errors
    }

    /// `Ok` when nothing failed, otherwise one combined I/O error.
    pub fn into_result(self) -> io::Result<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.into_iter().next().unwrap_or_else(|| io::Error::other("close failed"))),
            _ => Err(io::Error::other(self)),
        }
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CloseError {}
