use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;
use usbfs_transport::{Transport, TransportError};

use super::{step, Exit};
use crate::config::DriverConfig;
use crate::engine::{Engine, Progress};
use crate::error::Result;
use crate::fs::FileSystem;

/// Run the engine as a cooperative task.
///
/// The task yields to the scheduler after every engine step and only ever
/// suspends between steps, never inside a handler. When the engine is pending
/// it checks the readiness bit it is waiting for: readable for input, writable
/// while a response is queued. If that bit is clear it sleeps for
/// `poll_interval` before checking again. Intended for a current-thread tokio
/// runtime.
pub async fn run_cooperative<F: FileSystem, T: Transport + ?Sized>(
    engine: &mut Engine<F>,
    transport: &mut T,
    config: &DriverConfig,
    stop: &AtomicBool,
) -> Result<Exit> {
    loop {
        if stop.load(Ordering::Acquire) {
            debug!("cooperative driver stopped");
            return Ok(Exit::Stopped);
        }
        let progress = match step(engine, transport) {
            Ok(progress) => progress,
            Err(err) if err.is_closed() => return Ok(Exit::Closed),
            Err(err) => return Err(err),
        };
        if progress == Progress::Advanced {
            tokio::task::yield_now().await;
            continue;
        }
        let ready = match transport.readiness() {
            Ok(ready) => ready,
            Err(TransportError::Closed) => return Ok(Exit::Closed),
            Err(err) => return Err(err.into()),
        };
        let ready = if engine.has_pending_output() {
            ready.is_writable()
        } else {
            ready.is_readable()
        };
        if ready {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(config.poll_interval).await;
        }
    }
}
