use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Header: command (2) + size (4) + magic (2) + request id (4) = 12 bytes.
pub const HEADER_SIZE: usize = 12;

/// Synchronization marker carried in every header.
pub const MAGIC: u16 = 0xADDE;

/// Default maximum payload accepted by [`crate::FrameReader`]: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A decoded 12-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Command code.
    pub command: u16,
    /// Declared payload size in bytes.
    pub size: u32,
    /// Magic as found on the wire.
    pub magic: u16,
    /// Request id, echoed back by the device.
    pub request_id: u32,
}

impl Header {
    /// Create a header carrying the protocol magic.
    pub fn new(command: u16, request_id: u32, size: u32) -> Self {
        Self {
            command,
            size,
            magic: MAGIC,
            request_id,
        }
    }

    /// Whether the header is aligned on a frame boundary.
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut dst = &mut out[..];
        dst.put_u16_le(self.command);
        dst.put_u32_le(self.size);
        dst.put_u16_le(self.magic);
        dst.put_u32_le(self.request_id);
        out
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut src = &bytes[..];
        Self {
            command: src.get_u16_le(),
            size: src.get_u32_le(),
            magic: src.get_u16_le(),
            request_id: src.get_u32_le(),
        }
    }
}

/// Encode a header into its wire form.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────┬────────────────┐
/// │ Command (2B) │ Size (4B LE) │ Magic (2B)   │ Request id     │
/// │ LE           │              │ 0xDE 0xAD    │ (4B LE)        │
/// └──────────────┴──────────────┴──────────────┴────────────────┘
/// ```
pub fn encode_header(command: u16, request_id: u32, size: u32) -> [u8; HEADER_SIZE] {
    Header::new(command, request_id, size).to_bytes()
}

/// Decode a header. Never fails; check [`Header::is_valid`] before acting on it.
pub fn decode_header(bytes: &[u8; HEADER_SIZE]) -> Header {
    Header::from_bytes(bytes)
}

/// Append a header plus payload to `dst`.
pub fn encode_response(
    command: u16,
    request_id: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let size = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&encode_header(command, request_id, size));
    dst.put_slice(payload);
    Ok(())
}

/// A complete frame: header plus its payload.
#[derive(Debug, Clone)]
pub struct Frame {
    pub header: Header,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame; the header size is taken from the payload.
    ///
    /// Payloads longer than `u32::MAX` are rejected by the writer, not here.
    pub fn new(command: u16, request_id: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        let size = u32::try_from(payload.len()).unwrap_or(u32::MAX);
        Self {
            header: Header::new(command, request_id, size),
            payload,
        }
    }

    pub fn command(&self) -> u16 {
        self.header.command
    }

    pub fn request_id(&self) -> u32 {
        self.header.request_id
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Decode a whole frame from a buffer.
///
/// Returns `Ok(None)` until the buffer holds the header and all declared
/// payload bytes. On success the frame is consumed from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&src[..HEADER_SIZE]);
    let header = decode_header(&raw);
    if !header.is_valid() {
        return Err(FrameError::InvalidMagic(header.magic));
    }

    let payload_len = header.size as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }
    if src.len() < HEADER_SIZE + payload_len {
        return Ok(None);
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(Frame { header, payload }))
}

/// Configuration for host-side frame I/O.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_wire_layout() {
        let bytes = encode_header(0x1001, 0x0403_0201, 5);
        assert_eq!(
            bytes,
            [0x01, 0x10, 0x05, 0x00, 0x00, 0x00, 0xDE, 0xAD, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn header_roundtrip_extremes() {
        for (command, id, size) in [
            (0u16, 0u32, 0u32),
            (u16::MAX, u32::MAX, u32::MAX),
            (4098, 7, 1024),
        ] {
            let header = decode_header(&encode_header(command, id, size));
            assert_eq!(
                (header.command, header.size, header.magic, header.request_id),
                (command, size, MAGIC, id)
            );
            assert!(header.is_valid());
        }
    }

    #[test]
    fn decode_header_keeps_bad_magic() {
        let mut bytes = encode_header(1, 1, 0);
        bytes[6] = 0x00;
        let header = decode_header(&bytes);
        assert!(!header.is_valid());
        assert_eq!(header.magic, 0xAD00);
    }

    #[test]
    fn encode_response_appends_header_and_payload() {
        let mut buf = BytesMut::new();
        encode_response(4096, 9, b"/\nfa.txt", &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 8);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.command(), 4096);
        assert_eq!(frame.request_id(), 9);
        assert_eq!(frame.payload.as_ref(), b"/\nfa.txt");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[0x01, 0x00, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_response(4097, 1, b"hello", &mut buf).unwrap();
        buf.truncate(HEADER_SIZE + 2);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
    }

    #[test]
    fn decode_invalid_magic() {
        let mut buf = BytesMut::from(&[0xFFu8; HEADER_SIZE][..]);
        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(result, Err(FrameError::InvalidMagic(0xFFFF))));
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        buf.put_slice(&encode_header(4097, 1, 64));
        let result = decode_frame(&mut buf, 16);
        assert!(matches!(result, Err(FrameError::PayloadTooLarge { size: 64, max: 16 })));
    }

    #[test]
    fn empty_payload_frame() {
        let mut buf = BytesMut::new();
        encode_response(1, 3, b"", &mut buf).unwrap();
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        assert_eq!(frame.header.size, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn frame_wire_size() {
        let frame = Frame::new(1, 1, Bytes::from_static(b"test"));
        assert_eq!(frame.header.size, 4);
        assert_eq!(frame.wire_size(), HEADER_SIZE + 4);
    }
}
