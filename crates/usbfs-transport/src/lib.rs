//! Byte-stream transport capability for the usbfs protocol.
//!
//! The device engine never talks to hardware directly. It sees a vendor
//! endpoint through the [`Transport`] trait:
//! - `available()` reports how many bytes can be read without blocking
//! - `read()` / `send()` move bytes and may move fewer than asked
//! - `reset_requested()` carries the out-of-band bus reset signal
//!
//! Two endpoints ship with the crate: [`SocketTransport`] emulates the USB
//! vendor interface over a Unix domain socket, and [`MemoryTransport`] is a
//! scripted in-memory endpoint for tests and loopback use.

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod socket;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;
pub use traits::{Readiness, ResetSignal, Transport};

#[cfg(unix)]
pub use socket::{SocketListener, SocketTransport};
