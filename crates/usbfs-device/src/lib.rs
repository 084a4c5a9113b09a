//! Device side of the usbfs protocol.
//!
//! [`Engine`] reads 12-byte headers and payloads from a [`Transport`],
//! streams payloads through a bounded [`ReceiveWindow`] and hands them to the
//! command handlers, which act on a [`FileSystem`] and queue replies in an
//! [`Outbox`] the engine drains as the host reads. Drivers in [`driver`] run
//! the engine blocking, on a worker thread, or as a cooperative task
//! (feature `async`).
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use usbfs_device::{driver, DriverConfig, Engine, EngineConfig, LocalFs};
//! use usbfs_transport::SocketListener;
//!
//! let listener = SocketListener::bind("/tmp/usbfs.sock")?;
//! let mut transport = listener.accept()?;
//! let mut engine = Engine::new(LocalFs::new("/srv/device"), EngineConfig::default());
//! let stop = AtomicBool::new(false);
//! driver::run_blocking(&mut engine, &mut transport, &DriverConfig::default(), &stop)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! [`Transport`]: usbfs_transport::Transport

pub mod boot;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod engine;
pub mod error;
pub mod fs;
pub mod handler;
pub mod outbox;
pub mod window;

pub use boot::{store_next_program, take_next_program, DEFAULT_MARKER};
pub use config::{
    DriverConfig, EngineConfig, DEFAULT_IO_CHUNK_SIZE, DEFAULT_WINDOW_CAPACITY,
    SMALL_WINDOW_CAPACITY,
};
pub use dispatch::{Dispatcher, Route};
pub use driver::{run_blocking, spawn_worker, Exit, Outcome, Worker};
#[cfg(feature = "async")]
pub use driver::run_cooperative;
pub use engine::{Engine, EngineStats, Phase, Progress};
pub use error::{DeviceError, Result};
pub use fs::{copy_file, DirEntry, EntryKind, FileSystem, FsError, FsResult, LocalFs};
pub use handler::{Request, Responder, WriteSession, LIST_FAILED, OPEN_FAILED};
pub use outbox::Outbox;
pub use window::ReceiveWindow;
