use std::io::{Read, Write};

use tracing::{debug, warn};

use super::{nul_trimmed, Request, Responder};
use crate::fs::FileSystem;

#[derive(Debug)]
struct OpenFile<W> {
    path: String,
    writer: W,
    written: u64,
}

/// Output stream of the WriteFile command in flight plus its failure flag.
///
/// A session lives from the chunk carrying the path separator until the
/// command's last byte. A session still open when a new WriteFile begins is
/// stale and gets closed before anything else happens.
#[derive(Debug)]
pub struct WriteSession<W> {
    open: Option<OpenFile<W>>,
    failed: bool,
}

impl<W> Default for WriteSession<W> {
    fn default() -> Self {
        Self {
            open: None,
            failed: false,
        }
    }
}

impl<W: Write> WriteSession<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Path of the open stream.
    pub fn path(&self) -> Option<&str> {
        self.open.as_ref().map(|file| file.path.as_str())
    }

    /// Release the stream without replying. The failure flag is left alone.
    pub fn close(&mut self) {
        if let Some(file) = self.open.take() {
            debug!(path = %file.path, written = file.written, "write session closed");
        }
    }

    pub(crate) fn handle<F>(
        &mut self,
        fs: &F,
        request: &Request<'_>,
        out: &mut Responder<'_, F::Reader>,
    ) -> bool
    where
        F: FileSystem<Writer = W>,
    {
        if request.is_first_chunk() {
            if let Some(path) = self.path() {
                warn!(path, "closing stale write session");
                self.close();
            }
            self.failed = false;
        }

        if self.open.is_some() {
            self.append(request.buffer);
            if request.is_complete() {
                self.finish(out);
            }
            return true;
        }

        if self.failed {
            if request.is_complete() {
                out.error();
            }
            return true;
        }

        let Some(sep) = request.buffer.iter().position(|&b| b == 0) else {
            if request.is_complete() {
                warn!("write payload has no path separator");
                out.error();
                return true;
            }
            return false;
        };

        let opened = nul_trimmed(&request.buffer[..sep])
            .and_then(|path| fs.create(&path).map(|writer| (path, writer)));
        match opened {
            Ok((path, writer)) => {
                self.open = Some(OpenFile {
                    path,
                    writer,
                    written: 0,
                });
                self.append(&request.buffer[sep + 1..]);
            }
            Err(err) => {
                warn!(error = %err, "cannot open file for writing");
                self.failed = true;
            }
        }

        if request.is_complete() {
            self.finish(out);
        }
        true
    }

    fn append(&mut self, bytes: &[u8]) {
        let Some(file) = self.open.as_mut() else {
            return;
        };
        if bytes.is_empty() {
            return;
        }
        match file.writer.write_all(bytes) {
            Ok(()) => file.written += bytes.len() as u64,
            Err(err) => {
                warn!(path = %file.path, error = %err, "write failed, absorbing rest of payload");
                self.open = None;
                self.failed = true;
            }
        }
    }

    /// Close the stream and reply for the whole command.
    fn finish<R: Read>(&mut self, out: &mut Responder<'_, R>) {
        let Some(mut file) = self.open.take() else {
            out.error();
            return;
        };
        if let Err(err) = file.writer.flush() {
            warn!(path = %file.path, error = %err, "flush failed");
            self.failed = true;
            out.error();
            return;
        }
        debug!(path = %file.path, written = file.written, "file written");
        out.ok();
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use bytes::BytesMut;
    use usbfs_frame::{decode_frame, Status};
    use usbfs_transport::MemoryTransport;

    use super::*;
    use crate::fs::tests::scratch_root;
    use crate::fs::LocalFs;
    use crate::outbox::Outbox;

    const WRITE: u16 = 4098;

    fn chunk<'a>(declared: u32, received: u32, buffer: &'a [u8]) -> Request<'a> {
        Request {
            command: WRITE,
            request_id: 5,
            declared_size: declared,
            received,
            buffer,
        }
    }

    /// Feed one chunk to the session, as request `id`.
    fn feed(
        session: &mut WriteSession<File>,
        fs: &LocalFs,
        outbox: &mut Outbox<File>,
        id: u32,
        request: Request<'_>,
    ) -> bool {
        let request = Request {
            request_id: id,
            ..request
        };
        session.handle(fs, &request, &mut Responder::new(outbox, WRITE, id))
    }

    fn statuses(outbox: &mut Outbox<File>) -> Vec<Status> {
        let mut t = MemoryTransport::new();
        outbox.flush(&mut t).unwrap();
        let mut wire = BytesMut::from(t.outbound());
        let mut found = Vec::new();
        while let Some(frame) = decode_frame(&mut wire, usize::MAX).unwrap() {
            found.push(Status::parse(&frame.payload).expect("status payload"));
        }
        found
    }

    #[test]
    fn single_chunk_write() {
        let root = scratch_root("write-single");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        let consumed = feed(&mut session, &fs, &mut outbox, 5, chunk(12, 12, b"/x.txt\0hello"));
        assert!(consumed);
        assert!(!session.is_open());
        assert_eq!(std::fs::read(root.join("x.txt")).unwrap(), b"hello");
        assert_eq!(statuses(&mut outbox), vec![Status::Ok]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn split_write_keeps_session_open_between_chunks() {
        let root = scratch_root("write-split");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        assert!(feed(&mut session, &fs, &mut outbox, 5, chunk(12, 9, b"/x.txt\0he")));
        assert_eq!(session.path(), Some("/x.txt"));
        assert!(statuses(&mut outbox).is_empty());

        assert!(feed(&mut session, &fs, &mut outbox, 5, chunk(12, 12, b"llo")));
        assert!(!session.is_open());
        assert_eq!(std::fs::read(root.join("x.txt")).unwrap(), b"hello");
        assert_eq!(statuses(&mut outbox), vec![Status::Ok]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn waits_for_separator() {
        let root = scratch_root("write-wait");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        assert!(!feed(&mut session, &fs, &mut outbox, 5, chunk(12, 4, b"/x.t")));
        assert!(feed(&mut session, &fs, &mut outbox, 5, chunk(12, 12, b"/x.txt\0hello")));
        assert_eq!(std::fs::read(root.join("x.txt")).unwrap(), b"hello");
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_separator_in_complete_payload_is_an_error() {
        let root = scratch_root("write-nosep");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        assert!(feed(&mut session, &fs, &mut outbox, 5, chunk(6, 6, b"/x.txt")));
        assert_eq!(statuses(&mut outbox), vec![Status::Error]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn open_failure_absorbs_then_errors() {
        let root = scratch_root("write-fail");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        // Parent directory does not exist.
        assert!(feed(&mut session, &fs, &mut outbox, 5, chunk(16, 10, b"/no/x.txt\0")));
        assert!(session.has_failed());
        assert!(statuses(&mut outbox).is_empty());

        assert!(feed(&mut session, &fs, &mut outbox, 5, chunk(16, 16, b"hello!")));
        assert_eq!(statuses(&mut outbox), vec![Status::Error]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn stale_session_is_closed_by_next_write() {
        let root = scratch_root("write-stale");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        feed(&mut session, &fs, &mut outbox, 5, chunk(20, 9, b"/a.txt\0he"));
        assert_eq!(session.path(), Some("/a.txt"));

        feed(&mut session, &fs, &mut outbox, 6, chunk(9, 9, b"/b.txt\0hi"));
        assert!(!session.is_open());
        assert_eq!(std::fs::read(root.join("a.txt")).unwrap(), b"he");
        assert_eq!(std::fs::read(root.join("b.txt")).unwrap(), b"hi");
        assert_eq!(statuses(&mut outbox), vec![Status::Ok]);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn new_write_clears_previous_failure() {
        let root = scratch_root("write-clear");
        let fs = LocalFs::new(&root);
        let mut session = WriteSession::new();
        let mut outbox = Outbox::new(32);

        feed(&mut session, &fs, &mut outbox, 5, chunk(5, 5, b"\0data"));
        feed(&mut session, &fs, &mut outbox, 6, chunk(5, 5, b"/y\0ok"));
        assert_eq!(statuses(&mut outbox), vec![Status::Error, Status::Ok]);
        assert_eq!(std::fs::read(root.join("y")).unwrap(), b"ok");
        let _ = std::fs::remove_dir_all(&root);
    }
}
