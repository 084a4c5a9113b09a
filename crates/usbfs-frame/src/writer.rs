use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_response, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
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

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.command(), frame.request_id(), frame.payload.as_ref())
    }

    /// Encode and send one command frame (blocking).
    pub fn send(&mut self, command: u16, request_id: u32, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.buf.clear();
        encode_response(command, request_id, payload, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::{decode_frame, HEADER_SIZE};

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_command_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.send(4098, 11, b"/x.txt\0hello").unwrap();

        let mut wire = written(writer);
        assert_eq!(wire.len(), HEADER_SIZE + 12);
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(frame.command(), 4098);
        assert_eq!(frame.request_id(), 11);
        assert_eq!(frame.payload.as_ref(), b"/x.txt\0hello");
    }

    #[test]
    fn write_frame_uses_frame_header() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()));
        writer.write_frame(&Frame::new(1, 2, "")).unwrap();
        let mut wire = written(writer);
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!((frame.command(), frame.request_id()), (1, 2));
    }

    #[test]
    fn payload_limit_enforced() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::new()), cfg);
        let err = writer.send(4098, 1, b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let mut writer = FrameWriter::new(ZeroWriter);
        assert!(matches!(
            writer.send(1, 1, b""),
            Err(FrameError::ConnectionClosed)
        ));
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
