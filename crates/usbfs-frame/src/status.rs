//! Short status payloads and response builders.
//!
//! A status payload is a 2-character ASCII code followed by a NUL byte, so
//! the header announces 3 bytes. Parsing accepts the bare 2-byte form too.

use bytes::{Bytes, BytesMut};

use crate::codec::{encode_response, HEADER_SIZE};
use crate::error::Result;

/// Wire length of a status payload (code + NUL).
pub const STATUS_PAYLOAD_LEN: usize = 3;

/// Text answer to ListDir when the directory cannot be enumerated.
pub const LIST_FAILED: &str = "Can't list directory";

/// Text answer to ReadFile when the file cannot be opened. It travels in
/// place of file contents, so a file holding exactly these bytes reads as a
/// failure.
pub const OPEN_FAILED: &str = "Can't open file";

/// Status codes a device can answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `ok`: the command succeeded.
    Ok,
    /// `er`: the command failed.
    Error,
    /// `te`: timeout. Reserved, no device logic emits it.
    Timeout,
    /// `to`: reserved, unused.
    Reserved,
}

impl Status {
    pub fn code(self) -> &'static [u8; 2] {
        match self {
            Status::Ok => b"ok",
            Status::Error => b"er",
            Status::Timeout => b"te",
            Status::Reserved => b"to",
        }
    }

    /// Interpret a response payload as a status code, if it is one.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let code = match payload {
            [a, b] | [a, b, 0] => [*a, *b],
            _ => return None,
        };
        match &code {
            b"ok" => Some(Status::Ok),
            b"er" => Some(Status::Error),
            b"te" => Some(Status::Timeout),
            b"to" => Some(Status::Reserved),
            _ => None,
        }
    }

    pub fn payload(self) -> [u8; STATUS_PAYLOAD_LEN] {
        let [a, b] = *self.code();
        [a, b, 0]
    }

    /// Encode a complete status response.
    pub fn encode(self, command: u16, request_id: u32) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + STATUS_PAYLOAD_LEN);
        // A 3-byte payload always fits the u32 size field.
        let _ = encode_response(command, request_id, &self.payload(), &mut buf);
        buf.freeze()
    }
}

/// `ok` response.
pub fn ok(command: u16, request_id: u32) -> Bytes {
    Status::Ok.encode(command, request_id)
}

/// `er` response.
pub fn error(command: u16, request_id: u32) -> Bytes {
    Status::Error.encode(command, request_id)
}

/// `te` response. Reserved; nothing on the device sends it today.
pub fn timeout_reserved(command: u16, request_id: u32) -> Bytes {
    Status::Timeout.encode(command, request_id)
}

/// UTF-8 text response.
pub fn text(command: u16, request_id: u32, payload: &str) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_response(command, request_id, payload.as_bytes(), &mut buf)?;
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_frame, DEFAULT_MAX_PAYLOAD};

    fn decode(bytes: Bytes) -> crate::codec::Frame {
        let mut buf = BytesMut::from(bytes.as_ref());
        decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap()
    }

    #[test]
    fn ok_response_layout() {
        let frame = decode(ok(1, 42));
        assert_eq!(frame.command(), 1);
        assert_eq!(frame.request_id(), 42);
        assert_eq!(frame.header.size, 3);
        assert_eq!(frame.payload.as_ref(), b"ok\0");
    }

    #[test]
    fn builders_use_their_codes() {
        assert_eq!(decode(error(4099, 1)).payload.as_ref(), b"er\0");
        assert_eq!(decode(timeout_reserved(4099, 1)).payload.as_ref(), b"te\0");
    }

    #[test]
    fn text_response_carries_utf8() {
        let frame = decode(text(4097, 5, "Can't open file").unwrap());
        assert_eq!(frame.header.size, 15);
        assert_eq!(frame.payload.as_ref(), b"Can't open file");
    }

    #[test]
    fn parse_accepts_both_forms() {
        assert_eq!(Status::parse(b"ok\0"), Some(Status::Ok));
        assert_eq!(Status::parse(b"er"), Some(Status::Error));
        assert_eq!(Status::parse(b"to\0"), Some(Status::Reserved));
        assert_eq!(Status::parse(b"okay"), None);
        assert_eq!(Status::parse(b"xx\0"), None);
        assert_eq!(Status::parse(b""), None);
    }
}
