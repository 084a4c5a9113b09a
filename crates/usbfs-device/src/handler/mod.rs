//! File command handlers.
//!
//! A handler sees the bytes buffered so far for the command in flight and
//! answers whether it consumed them. Handlers that need the whole payload
//! return `false` until `received == declared_size`, which makes the engine
//! keep accumulating.

mod mutate;
mod query;
mod write;

use std::io::Read;

use tracing::warn;
use usbfs_frame::{Command, Status};
pub use usbfs_frame::{LIST_FAILED, OPEN_FAILED};

use crate::boot;
use crate::config::EngineConfig;
use crate::fs::{FileSystem, FsError, FsResult};
use crate::outbox::Outbox;

pub use write::WriteSession;

/// One handler invocation: the buffered window plus command progress.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub command: u16,
    pub request_id: u32,
    pub declared_size: u32,
    /// Payload bytes pulled from the transport so far, including consumed ones.
    pub received: u32,
    /// Window contents not yet consumed.
    pub buffer: &'a [u8],
}

impl Request<'_> {
    /// All declared bytes have arrived.
    pub fn is_complete(&self) -> bool {
        self.received == self.declared_size
    }

    /// Nothing of this command has been consumed yet.
    pub fn is_first_chunk(&self) -> bool {
        self.received as usize == self.buffer.len()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Queues responses for one request on the engine's [`Outbox`].
pub struct Responder<'o, R> {
    outbox: &'o mut Outbox<R>,
    command: u16,
    request_id: u32,
}

impl<'o, R: Read> Responder<'o, R> {
    pub fn new(outbox: &'o mut Outbox<R>, command: u16, request_id: u32) -> Self {
        Self {
            outbox,
            command,
            request_id,
        }
    }

    pub fn status(&mut self, status: Status) {
        self.outbox.push(&status.encode(self.command, self.request_id));
    }

    pub fn ok(&mut self) {
        self.status(Status::Ok);
    }

    pub fn error(&mut self) {
        self.status(Status::Error);
    }

    pub fn text(&mut self, text: &str) {
        match usbfs_frame::text(self.command, self.request_id, text) {
            Ok(frame) => self.outbox.push(&frame),
            Err(err) => {
                warn!(error = %err, "text response does not fit a frame");
                self.error();
            }
        }
    }

    /// Announce `size` bytes and stream them from `reader`.
    pub fn file(&mut self, path: String, reader: R, size: u32) {
        let header = usbfs_frame::encode_header(self.command, self.request_id, size);
        self.outbox.push(&header);
        self.outbox.push_body(path, reader, size);
    }

    /// `ok` or `er` depending on an operation's outcome.
    pub fn outcome<V>(&mut self, what: &str, result: FsResult<V>) {
        match result {
            Ok(_) => self.ok(),
            Err(err) => {
                warn!(error = %err, "{what} failed");
                self.error();
            }
        }
    }
}

/// The handler set of one engine, including the write session.
pub struct Handlers<F: FileSystem> {
    fs: F,
    session: WriteSession<F::Writer>,
    io_chunk_size: usize,
    boot_marker: Option<String>,
}

impl<F: FileSystem> std::fmt::Debug for Handlers<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("write_path", &self.session.path())
            .field("write_failed", &self.session.has_failed())
            .field("io_chunk_size", &self.io_chunk_size)
            .field("boot_marker", &self.boot_marker)
            .finish_non_exhaustive()
    }
}

impl<F: FileSystem> Handlers<F> {
    pub fn new(fs: F, config: &EngineConfig) -> Self {
        Self {
            fs,
            session: WriteSession::new(),
            io_chunk_size: config.io_chunk_size.max(1),
            boot_marker: config.boot_marker.clone(),
        }
    }

    pub fn session(&self) -> &WriteSession<F::Writer> {
        &self.session
    }

    /// Run the handler for `command`. Returns whether the buffer was consumed.
    pub fn handle(
        &mut self,
        command: Command,
        request: &Request<'_>,
        out: &mut Responder<'_, F::Reader>,
    ) -> bool {
        match command {
            Command::Heartbeat => query::heartbeat(request, out),
            Command::ListDir => query::list_dir(&self.fs, request, out),
            Command::ReadFile => query::read_file(&self.fs, request, out),
            Command::WriteFile => self.session.handle(&self.fs, request, out),
            Command::DeleteFile => mutate::delete(&self.fs, request, out),
            Command::DuplicateFile => {
                mutate::duplicate(&self.fs, self.io_chunk_size, request, out)
            }
            Command::MoveFile => mutate::rename(&self.fs, request, out),
            Command::MakeDir => mutate::make_dir(&self.fs, request, out),
            Command::LaunchNext => match &self.boot_marker {
                Some(marker) => boot::handle_launch_next(&self.fs, marker, request, out),
                None => true,
            },
        }
    }

    /// Drop any in-progress state (open write session).
    pub fn abort(&mut self) {
        self.session.close();
    }
}

/// Decode a path with every NUL byte removed.
pub fn nul_trimmed(bytes: &[u8]) -> FsResult<String> {
    let cleaned: Vec<u8> = bytes.iter().copied().filter(|&b| b != 0).collect();
    String::from_utf8(cleaned).map_err(|_| FsError::NotUtf8)
}

/// Split `source\0dest` at the first separator. Both sides are NUL-trimmed
/// and must be non-empty.
pub fn path_pair(bytes: &[u8]) -> FsResult<(String, String)> {
    let sep = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| FsError::InvalidPath(String::from_utf8_lossy(bytes).into_owned()))?;
    let source = nul_trimmed(&bytes[..sep])?;
    let dest = nul_trimmed(&bytes[sep + 1..])?;
    if source.is_empty() || dest.is_empty() {
        return Err(FsError::InvalidPath(format!("{source}\\0{dest}")));
    }
    Ok((source, dest))
}

#[cfg(test)]
mod tests {
    use usbfs_transport::MemoryTransport;

    use super::*;

    #[test]
    fn first_chunk_and_completion() {
        let req = Request {
            command: 4098,
            request_id: 1,
            declared_size: 12,
            received: 9,
            buffer: b"/x.txt\0he",
        };
        assert!(req.is_first_chunk());
        assert!(!req.is_complete());

        let later = Request {
            received: 12,
            buffer: b"llo",
            ..req
        };
        assert!(!later.is_first_chunk());
        assert!(later.is_complete());
    }

    #[test]
    fn empty_request_is_first_and_complete() {
        let req = Request {
            command: 1,
            request_id: 1,
            declared_size: 0,
            received: 0,
            buffer: &[],
        };
        assert!(req.is_first_chunk() && req.is_complete());
        assert_eq!(req.buffered_len(), 0);
    }

    #[test]
    fn nul_trimming_removes_every_nul() {
        assert_eq!(nul_trimmed(b"/a\0").unwrap(), "/a");
        assert_eq!(nul_trimmed(b"\0/a\0b\0").unwrap(), "/ab");
        assert!(matches!(nul_trimmed(&[0xFF, 0xFE]), Err(FsError::NotUtf8)));
    }

    #[test]
    fn path_pair_splits_at_first_separator() {
        assert_eq!(
            path_pair(b"/a\0/b\0").unwrap(),
            ("/a".to_string(), "/b".to_string())
        );
        assert_eq!(
            path_pair(b"/a\0/b\0c").unwrap(),
            ("/a".to_string(), "/bc".to_string())
        );
        assert!(path_pair(b"/a").is_err());
        assert!(path_pair(b"\0/b").is_err());
        assert!(path_pair(b"/a\0").is_err());
    }

    #[test]
    fn responder_frames_carry_request_identity() {
        let mut outbox: Outbox<std::io::Empty> = Outbox::new(32);
        let mut out = Responder::new(&mut outbox, 4099, 77);
        out.error();
        out.text("hi");

        let mut t = MemoryTransport::new();
        outbox.flush(&mut t).unwrap();
        let mut wire = bytes::BytesMut::from(t.outbound());
        let first = usbfs_frame::decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let second = usbfs_frame::decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!((first.command(), first.request_id()), (4099, 77));
        assert_eq!(first.payload.as_ref(), b"er\0");
        assert_eq!(second.payload.as_ref(), b"hi");
    }
}
