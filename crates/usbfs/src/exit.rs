use std::fmt;
use std::io;

use usbfs_device::{DeviceError, FsError};
use usbfs_frame::FrameError;
use usbfs_host::HostError;
use usbfs_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The device answered the command with a failure.
pub const REMOTE_FAILURE: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidMagic(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Transport(err) => transport_error(context, err),
        HostError::Frame(err) => frame_error(context, err),
        HostError::Remote { .. } | HostError::RemoteText { .. } => {
            CliError::new(REMOTE_FAILURE, format!("{context}: {err}"))
        }
        HostError::InvalidPath(_) => CliError::new(USAGE, format!("{context}: {err}")),
        HostError::Unexpected(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
    }
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::Transport(err) => transport_error(context, err),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn fs_error(context: &str, err: FsError) -> CliError {
    match err {
        FsError::Io { source, .. } => io_error(context, source),
        other => CliError::new(USAGE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use usbfs_frame::Status;

    use super::*;

    #[test]
    fn remote_failures_have_their_own_code() {
        let err = host_error(
            "rm failed",
            HostError::Remote {
                command: "DELETE_FILE",
                status: Status::Error,
            },
        );
        assert_eq!(err.code, REMOTE_FAILURE);
        assert!(err.message.starts_with("rm failed: "));
    }

    #[test]
    fn read_timeouts_map_to_timeout() {
        let timed_out = io::Error::new(io::ErrorKind::WouldBlock, "timed out");
        let err = host_error("ping failed", HostError::Frame(FrameError::Io(timed_out)));
        assert_eq!(err.code, TIMEOUT);
    }

    #[test]
    fn missing_socket_is_plain_failure() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                path: "/tmp/none.sock".into(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
            },
        );
        assert_eq!(err.code, FAILURE);
    }
}
