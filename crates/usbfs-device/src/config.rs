use std::time::Duration;

use crate::boot::DEFAULT_MARKER;

/// Receive window of the standard firmware build.
pub const DEFAULT_WINDOW_CAPACITY: usize = 1024;

/// Receive window of the reduced-memory build.
pub const SMALL_WINDOW_CAPACITY: usize = 256;

/// Chunk size used when streaming or copying file contents.
pub const DEFAULT_IO_CHUNK_SIZE: usize = 32;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bytes the receive window can hold before a handler must consume them.
    pub window_capacity: usize,
    /// Chunk size for file streaming and duplication.
    pub io_chunk_size: usize,
    /// Where LaunchNext stores the next-program marker. `None` disables the
    /// command; code 0 is then drained like any unknown code.
    pub boot_marker: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            io_chunk_size: DEFAULT_IO_CHUNK_SIZE,
            boot_marker: Some(DEFAULT_MARKER.to_string()),
        }
    }
}

impl EngineConfig {
    /// Configuration of the reduced-memory build: small window, no LaunchNext.
    pub fn small() -> Self {
        Self {
            window_capacity: SMALL_WINDOW_CAPACITY,
            boot_marker: None,
            ..Self::default()
        }
    }
}

/// Execution driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Longest a driver waits for transport readiness before re-checking its
    /// stop flag and the reset signal.
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }
}
