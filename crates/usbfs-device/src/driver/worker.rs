use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};
use usbfs_transport::Transport;

use super::{run_blocking, Exit};
use crate::config::DriverConfig;
use crate::engine::Engine;
use crate::error::{DeviceError, Result};
use crate::fs::FileSystem;

const THREAD_NAME: &str = "usbfs-device";

/// What a finished worker hands back: the engine, the transport and how the
/// session ended.
pub type Outcome<F, T> = (Engine<F>, T, Result<Exit>);

/// The blocking driver running on its own thread.
///
/// The thread owns the engine and the transport until [`Worker::join`]
/// hands them back.
#[derive(Debug)]
pub struct Worker<F: FileSystem, T> {
    handle: JoinHandle<Outcome<F, T>>,
    stop: Arc<AtomicBool>,
}

/// Move `engine` and `transport` onto a dedicated thread and start serving.
pub fn spawn_worker<F, T>(
    mut engine: Engine<F>,
    mut transport: T,
    config: DriverConfig,
) -> Result<Worker<F, T>>
where
    F: FileSystem + Send + 'static,
    F::Reader: Send,
    F::Writer: Send,
    T: Transport + Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name(THREAD_NAME.to_string())
        .spawn(move || {
            debug!("device worker started");
            let exit = run_blocking(&mut engine, &mut transport, &config, &thread_stop);
            if let Err(err) = &exit {
                warn!(error = %err, "device worker failed");
            }
            (engine, transport, exit)
        })
        .map_err(|e| DeviceError::Worker(e.to_string()))?;
    Ok(Worker { handle, stop })
}

impl<F: FileSystem, T> Worker<F, T> {
    /// Ask the worker to return after its current step.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Shared stop flag, e.g. for a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread and take back the engine and transport.
    ///
    /// The outer error means the thread panicked and took both with it. A
    /// session that failed still hands them back next to its error.
    pub fn join(self) -> Result<Outcome<F, T>> {
        self.handle
            .join()
            .map_err(|_| DeviceError::Worker("device worker panicked".to_string()))
    }
}
