use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Used on the host side, where a response (including a streamed file) is
/// always one header followed by exactly the announced number of bytes.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                trace!(
                    command = frame.command(),
                    request_id = frame.request_id(),
                    size = frame.payload.len(),
                    "frame received"
                );
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_header, encode_response, MAGIC};

    fn wire(frames: &[(u16, u32, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (command, id, payload) in frames {
            encode_response(*command, *id, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_sequence_of_frames() {
        let bytes = wire(&[(1, 1, b"ok\0"), (4096, 2, b"/\nfsub"), (4097, 3, b"")]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();
        assert_eq!((f1.command(), f1.payload.as_ref()), (1, b"ok\0".as_ref()));
        assert_eq!((f2.request_id(), f2.payload.as_ref()), (2, b"/\nfsub".as_ref()));
        assert!(f3.payload.is_empty());
    }

    #[test]
    fn large_streamed_payload() {
        let payload = vec![0x5A; 40 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire(&[(4097, 8, &payload)])));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.len(), payload.len());
    }

    #[test]
    fn byte_by_byte_delivery() {
        let bytes = wire(&[(4, 77, b"slow")]);
        let mut reader = FrameReader::new(OneByteAtATime { bytes, pos: 0 });
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.request_id(), 77);
        assert_eq!(frame.payload.as_ref(), b"slow");
    }

    #[test]
    fn eof_mid_frame_is_connection_closed() {
        let mut partial = BytesMut::new();
        partial.put_slice(&encode_header(4097, 1, 16));
        partial.put_slice(b"only-part");
        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        assert!(matches!(
            reader.read_frame(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn bad_magic_is_reported() {
        let mut bytes = encode_header(1, 1, 0).to_vec();
        bytes[6..8].copy_from_slice(&(MAGIC ^ 0xFFFF).to_le_bytes());
        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(reader.read_frame(), Err(FrameError::InvalidMagic(_))));
    }

    #[test]
    fn interrupted_read_is_retried() {
        let bytes = wire(&[(1, 9, b"ok\0")]);
        let mut reader = FrameReader::new(InterruptedOnce {
            interrupted: false,
            inner: Cursor::new(bytes),
        });
        assert_eq!(reader.read_frame().unwrap().request_id(), 9);
    }

    struct OneByteAtATime {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for OneByteAtATime {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedOnce {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
