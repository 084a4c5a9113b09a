//! Unix domain socket standing in for the USB vendor interface.
//!
//! A gadget bridge (or a test) exposes the device's bulk endpoints as one
//! stream socket. The device side binds a [`SocketListener`], the host side
//! connects with [`SocketListener::connect`].

use std::io::{ErrorKind, Read};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Readiness, ResetSignal, Transport};

/// `sockaddr_un.sun_path` capacity.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
const MAX_PATH_LEN: usize = 104;

/// Listening endpoint the device side accepts host connections on.
#[derive(Debug)]
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
    /// `(dev, ino)` of the socket file we created; cleanup only touches that file.
    identity: (u64, u64),
}

impl SocketListener {
    /// Permission mode applied to the socket file.
    pub const SOCKET_MODE: u32 = 0o600;

    /// Bind a socket file at `path`, replacing a stale socket left behind by a
    /// previous run. Regular files at `path` are never removed.
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = path.as_os_str().len();
        if len >= MAX_PATH_LEN {
            return Err(TransportError::PathTooLong {
                path,
                len,
                max: MAX_PATH_LEN,
            });
        }

        let bind_err = |source: std::io::Error| TransportError::Bind {
            path: path.clone(),
            source,
        };

        match std::fs::symlink_metadata(&path) {
            Ok(meta) if meta.file_type().is_socket() => {
                debug!(?path, "removing stale socket");
                std::fs::remove_file(&path).map_err(bind_err)?;
            }
            Ok(_) => {
                return Err(bind_err(std::io::Error::new(
                    ErrorKind::AlreadyExists,
                    "existing path is not a unix socket",
                )));
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(bind_err(err)),
        }

        let listener = UnixListener::bind(&path).map_err(bind_err)?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(Self::SOCKET_MODE))
            .map_err(bind_err)?;
        let meta = std::fs::symlink_metadata(&path).map_err(bind_err)?;

        info!(?path, "device endpoint listening");
        Ok(Self {
            listener,
            path,
            identity: (meta.dev(), meta.ino()),
        })
    }

    /// Wait for the next host connection.
    pub fn accept(&self) -> Result<SocketTransport> {
        let (stream, _addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(path = ?self.path, "host attached");
        Ok(SocketTransport::new(stream))
    }

    /// Wait up to `timeout` for a host connection.
    pub fn poll_accept(&self, timeout: Duration) -> Result<Option<SocketTransport>> {
        let revents = poll_fd(self.listener.as_raw_fd(), libc::POLLIN, poll_millis(timeout))
            .map_err(TransportError::Accept)?;
        if revents & libc::POLLIN == 0 {
            return Ok(None);
        }
        self.accept().map(Some)
    }

    /// Host side: connect to a listening device endpoint.
    pub fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
        let path = path.as_ref();
        UnixStream::connect(path).map_err(|source| TransportError::Connect {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let Ok(meta) = std::fs::symlink_metadata(&self.path) else {
            return;
        };
        if meta.file_type().is_socket() && (meta.dev(), meta.ino()) == self.identity {
            debug!(path = ?self.path, "removing socket file");
            let _ = std::fs::remove_file(&self.path);
        } else {
            debug!(path = ?self.path, "socket path replaced; leaving it alone");
        }
    }
}

/// Device-side view of a connected socket.
///
/// The stream stays in blocking mode; `available()` asks the kernel how many
/// bytes are queued, so reads issued after it never block. Sends use
/// `MSG_DONTWAIT` and report 0 when the socket buffer is full.
#[derive(Debug)]
pub struct SocketTransport {
    stream: UnixStream,
    reset: ResetSignal,
}

impl SocketTransport {
    pub fn new(stream: UnixStream) -> Self {
        Self {
            stream,
            reset: ResetSignal::new(),
        }
    }

    /// Handle for raising a bus reset on this endpoint.
    pub fn reset_signal(&self) -> ResetSignal {
        self.reset.clone()
    }

    fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl Transport for SocketTransport {
    fn available(&mut self) -> Result<usize> {
        let queued = queued_bytes(self.fd())?;
        if queued > 0 {
            return Ok(queued);
        }
        let revents = poll_fd(self.fd(), libc::POLLIN, 0)?;
        if revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) == 0 {
            return Ok(0);
        }
        // Data may have landed between the two calls. Readable with still
        // nothing queued means the peer hung up.
        match queued_bytes(self.fd())? {
            0 => Err(TransportError::Closed),
            queued => Ok(queued),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() || self.available()? == 0 {
            return Ok(0);
        }
        match self.stream.read(buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) if err.kind() == ErrorKind::Interrupted => Ok(0),
            Err(err) if is_hangup(&err) => Err(TransportError::Closed),
            Err(err) => Err(err.into()),
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match send_nonblocking(self.fd(), buf) {
            Ok(0) => Err(TransportError::Closed),
            Ok(n) => Ok(n),
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                Ok(0)
            }
            Err(err) if is_hangup(&err) => Err(TransportError::Closed),
            Err(err) => Err(err.into()),
        }
    }

    fn reset_requested(&mut self) -> bool {
        self.reset.take()
    }

    fn readiness(&mut self) -> Result<Readiness> {
        let revents = poll_fd(self.fd(), libc::POLLIN | libc::POLLOUT, 0)?;
        let mut ready = Readiness::NONE;
        if revents & libc::POLLIN != 0 {
            ready = ready | Readiness::READABLE;
        }
        if revents & libc::POLLOUT != 0 {
            ready = ready | Readiness::WRITABLE;
        }
        Ok(ready)
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        poll_fd(self.fd(), libc::POLLIN, poll_millis(timeout))?;
        Ok(self.available()? > 0)
    }

    fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
        let revents = poll_fd(self.fd(), libc::POLLOUT, poll_millis(timeout))?;
        if revents & libc::POLLHUP != 0 {
            return Err(TransportError::Closed);
        }
        Ok(revents & libc::POLLOUT != 0)
    }
}

fn poll_millis(timeout: Duration) -> libc::c_int {
    libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX)
}

fn is_hangup(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::BrokenPipe | ErrorKind::ConnectionReset)
}

fn send_nonblocking(fd: RawFd, buf: &[u8]) -> std::io::Result<usize> {
    // SAFETY: `fd` is an open socket owned by the caller and `buf` is valid
    // for `buf.len()` bytes of reads.
    let rc = unsafe { libc::send(fd, buf.as_ptr().cast(), buf.len(), libc::MSG_DONTWAIT) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(rc as usize)
}

fn queued_bytes(fd: RawFd) -> std::io::Result<usize> {
    let mut queued: libc::c_int = 0;
    // SAFETY: `fd` is an open socket owned by the caller and `queued` is a
    // valid writable c_int, which is what FIONREAD stores into.
    let rc = unsafe { libc::ioctl(fd, libc::FIONREAD, &mut queued as *mut libc::c_int) };
    if rc < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(usize::try_from(queued).unwrap_or(0))
}

fn poll_fd(
    fd: RawFd,
    events: libc::c_short,
    timeout_ms: libc::c_int,
) -> std::io::Result<libc::c_short> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    // SAFETY: `pfd` is a single valid pollfd and the count passed is 1.
    let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if rc < 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(0);
        }
        return Err(err);
    }
    Ok(pfd.revents)
}
