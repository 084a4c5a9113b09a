//! Command code to handler routing.

use usbfs_frame::Command;

/// Where the payload of a frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A handler processes the payload.
    Handle(Command),
    /// The payload is read off the transport and dropped; no response.
    Drain,
}

/// Static routing table.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    launch_next: bool,
}

impl Dispatcher {
    /// `launch_next` enables routing of code 0.
    pub fn new(launch_next: bool) -> Self {
        Self { launch_next }
    }

    pub fn route(&self, code: u16) -> Route {
        match Command::from_code(code) {
            Some(Command::LaunchNext) if !self.launch_next => Route::Drain,
            Some(command) => Route::Handle(command),
            None => Route::Drain,
        }
    }
}
