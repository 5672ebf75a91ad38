//! Multi-part submissions bundling a body with named file streams.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;

use crate::body::{CloseError, Contents};

/// A primary body plus file streams keyed by their submitted file names.
#[derive(Default)]
pub struct ComplexPayload {
    /// Raw form of the non-file input.
    pub body: Bytes,
    pub files: HashMap<String, Box<dyn Contents>>,
}

impl ComplexPayload {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, name: impl Into<String>, contents: Box<dyn Contents>) -> Self {
        self.files.insert(name.into(), contents);
        self
    }

    /// Take ownership of one file stream.
    pub fn take_file(&mut self, name: &str) -> Option<Box<dyn Contents>> {
        self.files.remove(name)
    }

    /// Close every file stream, reporting all failures.
    pub async fn close(&mut self) -> std::io::Result<()> {
        let mut errs = CloseError::new();
        for (name, mut contents) in self.files.drain() {
            if let Err(e) = contents.close().await {
                errs.push_err(std::io::Error::new(
                    e.kind(),
                    format!("failed to close {name}: {e}"),
                ));
            }
        }
        errs.into_result()
    }
}

impl fmt::Debug for ComplexPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.files.keys().collect();
        names.sort();
        f.debug_struct("ComplexPayload")
            .field("body", &self.body)
            .field("files", &names)
            .finish()
    }
}
