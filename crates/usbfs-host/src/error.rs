use usbfs_frame::Status;

/// Errors returned by host-side requests.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Connecting or socket setup failed.
    #[error("transport error: {0}")]
    Transport(#[from] usbfs_transport::TransportError),

    /// Frame-level error while talking to the device.
    #[error("frame error: {0}")]
    Frame(#[from] usbfs_frame::FrameError),

    /// The device answered with a non-ok status.
    #[error("{command} failed on device: {status:?}")]
    Remote {
        command: &'static str,
        status: Status,
    },

    /// The device answered with a failure message.
    #[error("{command} failed on device: {message}")]
    RemoteText {
        command: &'static str,
        message: String,
    },

    /// A path or program name cannot be encoded (it contains a NUL byte).
    #[error("invalid path {0:?}")]
    InvalidPath(String),

    /// The response does not belong to the request or cannot be decoded.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl HostError {
    /// Whether the device rejected the request (as opposed to a link failure).
    pub fn is_remote(&self) -> bool {
        matches!(self, HostError::Remote { .. } | HostError::RemoteText { .. })
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
