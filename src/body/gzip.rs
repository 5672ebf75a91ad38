//! Streaming gzip compression over a bounded pipe.
//!
//! # Data Flow
//! ```text
//! source stream
//!     → background task (read chunk → GzEncoder → drain compressed bytes)
//!     → bounded channel (PIPE_DEPTH chunks)
//!     → GzipContents::poll_read (consumer)
//! ```
//!
//! # Design Decisions
//! - The background task starts on the first read, never at construction
//! - A full channel blocks the producer, so memory stays bounded for
//!   arbitrarily large sources
//! - Read and compression failures travel down the pipe as errors; the
//!   consumer never mistakes a failed stream for a short one
//! - `close` joins the task and closes the source, reporting every failure

use std::io::{self, Write};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::body::contents::{CloseError, Contents};

const PIPE_DEPTH: usize = 4;
const CHUNK_SIZE: usize = 32 * 1024;

/// What the compression task hands back when it finishes.
struct Finished {
    source: Box<dyn Contents>,
    errors: Vec<io::Error>,
}

enum State {
    Idle(Box<dyn Contents>),
    Running(JoinHandle<Finished>),
    Closed,
}

/// A [`Contents`] yielding the gzip-compressed bytes of another stream.
pub struct GzipContents {
    state: State,
    started: AtomicBool,
    rx: Option<mpsc::Receiver<io::Result<Bytes>>>,
    pending: Bytes,
}

impl GzipContents {
    pub fn new(source: Box<dyn Contents>) -> Self {
        Self {
            state: State::Idle(source),
            started: AtomicBool::new(false),
            rx: None,
            pending: Bytes::new(),
        }
    }

    fn start(&mut self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let State::Idle(source) = std::mem::replace(&mut self.state, State::Closed) else {
            return;
        };
        let (tx, rx) = mpsc::channel(PIPE_DEPTH);
        self.rx = Some(rx);
        self.state = State::Running(tokio::spawn(compress(source, tx)));
    }
}

async fn compress(mut source: Box<dyn Contents>, tx: mpsc::Sender<io::Result<Bytes>>) -> Finished {
    let mut errors = Vec::new();
    let mut encoder = GzEncoder::new(Vec::with_capacity(CHUNK_SIZE), Compression::default());
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match source.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                let _ = tx.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
                errors.push(e);
                return Finished { source, errors };
            }
        };

        if let Err(e) = encoder.write_all(&buf[..n]) {
            let _ = tx.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
            errors.push(e);
            return Finished { source, errors };
        }

        let out = std::mem::take(encoder.get_mut());
        if !out.is_empty() && tx.send(Ok(Bytes::from(out))).await.is_err() {
            // Consumer went away; nothing left to deliver.
            return Finished { source, errors };
        }
    }

    match encoder.finish() {
        Ok(tail) => {
            if !tail.is_empty() {
                let _ = tx.send(Ok(Bytes::from(tail))).await;
            }
        }
        Err(e) => {
            let _ = tx.send(Err(io::Error::new(e.kind(), e.to_string()))).await;
            errors.push(e);
        }
    }

    Finished { source, errors }
}

impl AsyncRead for GzipContents {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        this.start();

        loop {
            if !this.pending.is_empty() {
                let n = this.pending.len().min(buf.remaining());
                buf.put_slice(&this.pending.split_to(n));
                return Poll::Ready(Ok(()));
            }

            let Some(rx) = this.rx.as_mut() else {
                return Poll::Ready(Ok(()));
            };
            match rx.poll_recv(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.pending = chunk,
                Poll::Ready(Some(Err(e))) => return Poll::Ready(Err(e)),
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[async_trait]
impl Contents for GzipContents {
    async fn close(&mut self) -> io::Result<()> {
        let mut errs = CloseError::new();

        // Dropping the receiver unblocks a producer waiting on a full pipe.
        self.rx = None;
        self.pending = Bytes::new();

        match std::mem::replace(&mut self.state, State::Closed) {
            State::Idle(mut source) => errs.push(source.close().await),
            State::Running(task) => match task.await {
                Ok(Finished { mut source, errors }) => {
                    for e in errors {
                        errs.push_err(e);
                    }
                    errs.push(source.close().await);
                }
                Err(e) => errs.push_err(io::Error::other(format!("gzip compression task failed: {e}"))),
            },
            State::Closed => {}
        }

        errs.into_result()
    }
}
