use std::io::{Read, Write};
use std::path::Path;

use bytes::Bytes;
use tracing::debug;
use usbfs_frame::{
    Command, Frame, FrameConfig, FrameReader, FrameWriter, Status, LIST_FAILED, OPEN_FAILED,
};

use crate::error::{HostError, Result};
use crate::listing::Listing;

/// ListDir payloads shorter than this are read as "list the root" by the
/// device, so path payloads are padded up to it.
const MIN_PATH_PAYLOAD: usize = 3;

/// Blocking client issuing one command at a time.
pub struct Client<R: Read, W: Write> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    next_id: u32,
}

#[cfg(unix)]
impl Client<std::os::unix::net::UnixStream, std::os::unix::net::UnixStream> {
    /// Connect to a device endpoint socket.
    pub fn connect(path: impl AsRef<Path>, config: FrameConfig) -> Result<Self> {
        let stream = usbfs_transport::SocketListener::connect(path.as_ref())?;
        stream
            .set_read_timeout(config.read_timeout)
            .map_err(usbfs_transport::TransportError::from)?;
        stream
            .set_write_timeout(config.write_timeout)
            .map_err(usbfs_transport::TransportError::from)?;
        let reader = stream
            .try_clone()
            .map_err(usbfs_transport::TransportError::from)?;
        debug!(path = ?path.as_ref(), "connected to device");
        Ok(Self::with_config(reader, stream, config))
    }
}

impl<R: Read, W: Write> Client<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, FrameConfig::default())
    }

    pub fn with_config(reader: R, writer: W, config: FrameConfig) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.clone()),
            writer: FrameWriter::with_config(writer, config),
            next_id: 1,
        }
    }

    fn next_request_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    /// Send one command and wait for its response frame.
    pub fn request(&mut self, command: Command, payload: &[u8]) -> Result<Frame> {
        let request_id = self.next_request_id();
        debug!(command = command.name(), request_id, size = payload.len(), "request");
        self.writer.send(command.code(), request_id, payload)?;
        self.writer.flush()?;

        let frame = self.reader.read_frame()?;
        if frame.command() != command.code() || frame.request_id() != request_id {
            return Err(HostError::Unexpected(format!(
                "response {}#{} to request {}#{}",
                frame.command(),
                frame.request_id(),
                command.code(),
                request_id
            )));
        }
        Ok(frame)
    }

    fn expect_ok(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        let frame = self.request(command, payload)?;
        match Status::parse(&frame.payload) {
            Some(Status::Ok) => Ok(()),
            Some(status) => Err(HostError::Remote {
                command: command.name(),
                status,
            }),
            None => Err(HostError::Unexpected(format!(
                "{} answered {:?}",
                command.name(),
                String::from_utf8_lossy(&frame.payload)
            ))),
        }
    }

    pub fn heartbeat(&mut self) -> Result<()> {
        self.expect_ok(Command::Heartbeat, &[])
    }

    /// List a directory; `None` lists the root.
    pub fn list_dir(&mut self, path: Option<&str>) -> Result<Listing> {
        let payload = match path {
            Some(path) => {
                let mut payload = path_payload(path)?;
                payload.resize(payload.len().max(MIN_PATH_PAYLOAD), 0);
                payload
            }
            None => Vec::new(),
        };
        let frame = self.request(Command::ListDir, &payload)?;
        let text = std::str::from_utf8(&frame.payload)
            .map_err(|_| HostError::Unexpected("listing is not UTF-8".to_string()))?;
        if text == LIST_FAILED {
            return Err(HostError::RemoteText {
                command: Command::ListDir.name(),
                message: text.to_string(),
            });
        }
        Listing::parse(text)
    }

    /// Fetch a whole file.
    ///
    /// The device reports failure with a fixed text in place of the contents;
    /// a file consisting of exactly that text is indistinguishable from it.
    pub fn read_file(&mut self, path: &str) -> Result<Bytes> {
        let frame = self.request(Command::ReadFile, &path_payload(path)?)?;
        if frame.payload.as_ref() == OPEN_FAILED.as_bytes() {
            return Err(HostError::RemoteText {
                command: Command::ReadFile.name(),
                message: OPEN_FAILED.to_string(),
            });
        }
        Ok(frame.payload)
    }

    /// Create or replace a file with `contents`.
    pub fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<()> {
        let mut payload = path_payload(path)?;
        payload.extend_from_slice(contents);
        self.expect_ok(Command::WriteFile, &payload)
    }

    pub fn delete(&mut self, path: &str) -> Result<()> {
        self.expect_ok(Command::DeleteFile, &path_payload(path)?)
    }

    pub fn duplicate(&mut self, source: &str, dest: &str) -> Result<()> {
        self.expect_ok(Command::DuplicateFile, &pair_payload(source, dest)?)
    }

    pub fn rename(&mut self, source: &str, dest: &str) -> Result<()> {
        self.expect_ok(Command::MoveFile, &pair_payload(source, dest)?)
    }

    pub fn make_dir(&mut self, path: &str) -> Result<()> {
        self.expect_ok(Command::MakeDir, &path_payload(path)?)
    }

    /// Ask the device to run `program` on its next boot.
    pub fn launch_next(&mut self, program: &str) -> Result<()> {
        self.expect_ok(Command::LaunchNext, &path_payload(program)?)
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader.into_inner(), self.writer.into_inner())
    }
}

/// `path` followed by its NUL terminator.
fn path_payload(path: &str) -> Result<Vec<u8>> {
    if path.is_empty() || path.contains('\0') {
        return Err(HostError::InvalidPath(path.to_string()));
    }
    let mut payload = Vec::with_capacity(path.len() + 1);
    payload.extend_from_slice(path.as_bytes());
    payload.push(0);
    Ok(payload)
}

fn pair_payload(source: &str, dest: &str) -> Result<Vec<u8>> {
    let mut payload = path_payload(source)?;
    payload.extend(path_payload(dest)?);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;
    use usbfs_frame::encode_response;

    use super::*;

    fn canned(command: Command, request_id: u32, payload: &[u8]) -> Cursor<Vec<u8>> {
        let mut buf = BytesMut::new();
        encode_response(command.code(), request_id, payload, &mut buf).unwrap();
        Cursor::new(buf.to_vec())
    }

    #[test]
    fn payload_encoding() {
        assert_eq!(path_payload("/a").unwrap(), b"/a\0");
        assert_eq!(pair_payload("/a", "/b").unwrap(), b"/a\0/b\0");
        assert!(matches!(path_payload("a\0b"), Err(HostError::InvalidPath(_))));
        assert!(matches!(path_payload(""), Err(HostError::InvalidPath(_))));
    }

    #[test]
    fn request_ids_start_at_one_and_skip_zero() {
        let mut client = Client::new(Cursor::new(Vec::new()), Vec::new());
        assert_eq!(client.next_request_id(), 1);
        client.next_id = u32::MAX;
        assert_eq!(client.next_request_id(), u32::MAX);
        assert_eq!(client.next_request_id(), 1);
    }

    #[test]
    fn short_list_path_is_padded() {
        let mut client = Client::new(canned(Command::ListDir, 1, b"/a"), Vec::new());
        let listing = client.list_dir(Some("/a")).unwrap();
        assert_eq!(listing.path, "/a");

        let (_, sent) = client.into_parts();
        assert_eq!(sent.len(), 12 + MIN_PATH_PAYLOAD);
        assert_eq!(&sent[12..], b"/a\0");
    }

    #[test]
    fn error_status_becomes_remote_error() {
        let mut client = Client::new(canned(Command::DeleteFile, 1, b"er\0"), Vec::new());
        let err = client.delete("/missing").unwrap_err();
        assert!(err.is_remote());
        assert!(matches!(
            err,
            HostError::Remote {
                status: Status::Error,
                ..
            }
        ));
    }

    #[test]
    fn mismatched_request_id_is_unexpected() {
        let mut client = Client::new(canned(Command::Heartbeat, 5, b"ok\0"), Vec::new());
        assert!(matches!(client.heartbeat(), Err(HostError::Unexpected(_))));
    }

    #[test]
    fn open_failure_text_is_reported() {
        let reply = canned(Command::ReadFile, 1, OPEN_FAILED.as_bytes());
        let mut client = Client::new(reply, Vec::new());
        assert!(matches!(
            client.read_file("/nope"),
            Err(HostError::RemoteText { .. })
        ));
    }
}
