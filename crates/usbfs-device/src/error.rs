use usbfs_transport::TransportError;

/// Errors that stop the device engine.
///
/// Filesystem failures never show up here; handlers turn them into status
/// responses. Only the link itself can fail the engine.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The transport failed or the host went away.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The worker thread could not be started or panicked.
    #[error("worker thread failed: {0}")]
    Worker(String),
}

impl DeviceError {
    /// Whether this is the normal end of a host session.
    pub fn is_closed(&self) -> bool {
        matches!(self, DeviceError::Transport(TransportError::Closed))
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;
