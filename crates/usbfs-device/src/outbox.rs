//! Outbound queue between the handlers and the transport.
//!
//! Handlers never write to the transport themselves. They queue frames here
//! and the engine flushes whatever the transport accepts on each step, so a
//! host that stops draining stalls the engine at an I/O boundary instead of
//! inside a handler. A ReadFile body is pulled from its reader one chunk at a
//! time as the queue empties.

use std::fmt;
use std::io::{ErrorKind, Read};

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};
use usbfs_transport::{Transport, TransportError};

use crate::error::Result;

struct FileBody<R> {
    path: String,
    reader: R,
    remaining: u32,
    exhausted: bool,
}

/// Bytes waiting for the host plus an optional file body still being read.
pub struct Outbox<R> {
    pending: BytesMut,
    body: Option<FileBody<R>>,
    chunk_size: usize,
}

impl<R> fmt::Debug for Outbox<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbox")
            .field("pending", &self.pending.len())
            .field("body", &self.body.as_ref().map(|body| body.remaining))
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl<R: Read> Outbox<R> {
    pub fn new(chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            pending: BytesMut::with_capacity(chunk_size),
            body: None,
            chunk_size,
        }
    }

    /// Nothing is left to send.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.body.is_none()
    }

    /// Queue raw bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Queue `size` bytes to be read from `reader` after what is already
    /// queued. A reader that ends early is padded with zeros.
    pub fn push_body(&mut self, path: String, reader: R, size: u32) {
        if size == 0 {
            return;
        }
        self.body = Some(FileBody {
            path,
            reader,
            remaining: size,
            exhausted: false,
        });
    }

    /// Drop everything queued, including an unfinished file body.
    pub fn clear(&mut self) {
        if let Some(body) = self.body.take() {
            debug!(path = %body.path, remaining = body.remaining, "file body dropped");
        }
        self.pending.clear();
    }

    /// Send as much as the transport takes right now. Returns the number of
    /// bytes sent; 0 means the transport is not accepting.
    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        let mut sent = 0usize;
        loop {
            if self.pending.is_empty() && !self.refill() {
                break;
            }
            match transport.send(&self.pending) {
                Ok(0) => break,
                Ok(n) => {
                    self.pending.advance(n);
                    sent += n;
                }
                Err(TransportError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(sent)
    }

    /// Move the next chunk of the file body into `pending`.
    fn refill(&mut self) -> bool {
        let Some(body) = self.body.as_mut() else {
            return false;
        };
        let want = (body.remaining as usize).min(self.chunk_size);
        self.pending.resize(want, 0);
        let n = if body.exhausted {
            0
        } else {
            loop {
                match body.reader.read(&mut self.pending[..want]) {
                    Ok(n) => break n,
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) => {
                        warn!(path = %body.path, error = %err, "read failed mid-stream, padding");
                        break 0;
                    }
                }
            }
        };
        if n == 0 {
            // Source ended early: keep the announced length with zeros.
            body.exhausted = true;
            self.pending[..want].fill(0);
        } else {
            self.pending.truncate(n);
        }
        body.remaining -= self.pending.len() as u32;
        if body.remaining == 0 {
            if let Some(body) = self.body.take() {
                debug!(path = %body.path, padded = body.exhausted, "file streamed");
            }
        }
        true
    }
}
