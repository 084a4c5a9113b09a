use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use usbfs_transport::{Transport, TransportError};

use super::{step, Exit};
use crate::config::DriverConfig;
use crate::engine::{Engine, Progress};
use crate::error::Result;
use crate::fs::FileSystem;

/// Run the engine on the calling thread until `stop` is raised or the host
/// closes the link.
///
/// When the engine is pending the thread blocks in [`Transport::wait_readable`],
/// or in [`Transport::wait_writable`] while a response is queued, for at most
/// `poll_interval`, so `stop` is observed with that latency.
pub fn run_blocking<F: FileSystem, T: Transport + ?Sized>(
    engine: &mut Engine<F>,
    transport: &mut T,
    config: &DriverConfig,
    stop: &AtomicBool,
) -> Result<Exit> {
    loop {
        if stop.load(Ordering::Acquire) {
            debug!("blocking driver stopped");
            return Ok(Exit::Stopped);
        }
        let progress = match step(engine, transport) {
            Ok(progress) => progress,
            Err(err) if err.is_closed() => return Ok(Exit::Closed),
            Err(err) => return Err(err),
        };
        if progress == Progress::Pending {
            let waited = if engine.has_pending_output() {
                transport.wait_writable(config.poll_interval)
            } else {
                transport.wait_readable(config.poll_interval)
            };
            match waited {
                Ok(_) => {}
                Err(TransportError::Closed) => return Ok(Exit::Closed),
                Err(err) => return Err(err.into()),
            }
        }
    }
}
