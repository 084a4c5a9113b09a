//! Framing for the usbfs device protocol.
//!
//! Every command and every response starts with the same 12-byte header:
//! - a 2-byte little-endian command code
//! - a 4-byte little-endian payload size
//! - the 2-byte magic `0xADDE` for stream synchronization
//! - a 4-byte little-endian request id echoed back in the response
//!
//! Responses are either a short status code (`ok`, `er`), UTF-8 text, or
//! raw file bytes.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod status;
pub mod writer;

pub use codec::{
    decode_frame, decode_header, encode_header, encode_response, Frame, FrameConfig, Header,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use command::{command_name, Command};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use status::{
    error, ok, text, timeout_reserved, Status, LIST_FAILED, OPEN_FAILED, STATUS_PAYLOAD_LEN,
};
pub use writer::FrameWriter;
