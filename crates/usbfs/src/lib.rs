//! File access to a small device over a USB vendor interface.
//!
//! The host sends 12-byte framed commands (list, read, write, delete, copy,
//! move, mkdir, heartbeat, launch-next); the device streams payloads through
//! a bounded receive window and answers each command with one response.
//!
//! # Crate Structure
//!
//! - [`transport`]: endpoint abstraction, Unix socket and in-memory endpoints
//! - [`frame`]: header codec, command table and status payloads
//! - [`device`]: receive engine, command handlers and execution drivers
//! - [`host`]: blocking client (behind the `host` feature)

/// Re-export transport types.
pub mod transport {
    pub use usbfs_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use usbfs_frame::*;
}

/// Re-export device types.
pub mod device {
    pub use usbfs_device::*;
}

/// Re-export host client types (requires `host` feature).
#[cfg(feature = "host")]
pub mod host {
    pub use usbfs_host::*;
}
