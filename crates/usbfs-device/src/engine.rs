//! Streaming receive engine.
//!
//! The engine is a non-blocking step function. Each [`Engine::poll`] performs
//! at most one transport read and the handler call that follows it, or one
//! flush of queued response bytes, then reports whether it made progress.
//! Drivers decide how to wait when it did not: for input, or for the host to
//! drain output when [`Engine::has_pending_output`] says so.

use tracing::{debug, trace, warn};
use usbfs_frame::{Command, Header, HEADER_SIZE};
use usbfs_transport::Transport;

use crate::config::EngineConfig;
use crate::dispatch::{Dispatcher, Route};
use crate::error::Result;
use crate::fs::FileSystem;
use crate::handler::{Handlers, Request, Responder};
use crate::outbox::Outbox;
use crate::window::ReceiveWindow;

/// Outcome of one engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// The transport has nothing for the current state, or takes no more
    /// output right now.
    Pending,
    /// Bytes were read or a state transition happened.
    Advanced,
}

/// Externally visible engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    HeaderValid,
    Streaming,
    /// Payload of an unknown or rejected command is being read and dropped.
    Draining,
    Resync,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    HeaderValid(Header),
    Streaming { header: Header, route: Route },
    Resync,
}

/// Counters since the engine was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Headers with a valid magic.
    pub frames: u64,
    /// Frames whose payload was dropped without a handler.
    pub drained: u64,
    /// Commands rejected because the window filled up unconsumed.
    pub overflows: u64,
    /// Bad-magic headers.
    pub resyncs: u64,
}

/// Receive engine over one device filesystem.
#[derive(Debug)]
pub struct Engine<F: FileSystem> {
    state: State,
    header_buf: [u8; HEADER_SIZE],
    header_len: usize,
    window: ReceiveWindow,
    dispatcher: Dispatcher,
    handlers: Handlers<F>,
    outbox: Outbox<F::Reader>,
    stats: EngineStats,
}

impl<F: FileSystem> Engine<F> {
    pub fn new(fs: F, config: EngineConfig) -> Self {
        Self {
            state: State::Idle,
            header_buf: [0u8; HEADER_SIZE],
            header_len: 0,
            window: ReceiveWindow::new(config.window_capacity),
            dispatcher: Dispatcher::new(config.boot_marker.is_some()),
            handlers: Handlers::new(fs, &config),
            outbox: Outbox::new(config.io_chunk_size),
            stats: EngineStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::HeaderValid(_) => Phase::HeaderValid,
            State::Streaming {
                route: Route::Drain,
                ..
            } => Phase::Draining,
            State::Streaming { .. } => Phase::Streaming,
            State::Resync => Phase::Resync,
        }
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Whether a WriteFile output stream is currently open.
    pub fn write_in_progress(&self) -> bool {
        self.handlers.session().is_open()
    }

    /// Response bytes are queued that the host has not taken yet. No new
    /// input is read until they are gone.
    pub fn has_pending_output(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Run one step of the state machine.
    pub fn poll<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Progress> {
        if !self.outbox.is_empty() {
            return self.poll_output(transport);
        }
        match self.state {
            State::Idle => self.poll_header(transport),
            State::HeaderValid(header) => self.start_command(header, transport),
            State::Streaming { header, route } => self.poll_payload(header, route, transport),
            State::Resync => self.poll_resync(transport),
        }
    }

    /// Step until the transport has nothing more for the engine.
    pub fn run_until_pending<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Phase> {
        while self.poll(transport)? == Progress::Advanced {}
        Ok(self.phase())
    }

    /// Forget the command in flight, its queued output and any open write
    /// stream.
    pub fn reset(&mut self) {
        if !matches!(self.state, State::Idle) || self.header_len > 0 {
            debug!(phase = ?self.phase(), "engine reset mid-command");
        }
        self.handlers.abort();
        self.outbox.clear();
        self.window.reset();
        self.header_len = 0;
        self.state = State::Idle;
    }

    /// Read and drop whatever the transport has buffered right now.
    pub fn discard_input<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        let mut scratch = [0u8; HEADER_SIZE];
        let mut discarded = 0usize;
        while transport.available()? > 0 {
            let n = transport.read(&mut scratch)?;
            if n == 0 {
                break;
            }
            discarded += n;
        }
        if discarded > 0 {
            debug!(discarded, "stale input discarded");
        }
        Ok(discarded)
    }

    fn poll_output<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Progress> {
        let sent = self.outbox.flush(transport)?;
        trace!(sent, drained = self.outbox.is_empty(), "response bytes sent");
        if sent == 0 {
            return Ok(Progress::Pending);
        }
        Ok(Progress::Advanced)
    }

    fn poll_header<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Progress> {
        if transport.available()? == 0 {
            return Ok(Progress::Pending);
        }
        let n = transport.read(&mut self.header_buf[self.header_len..])?;
        if n == 0 {
            return Ok(Progress::Pending);
        }
        self.header_len += n;
        if self.header_len < HEADER_SIZE {
            return Ok(Progress::Advanced);
        }
        self.header_len = 0;

        let header = Header::from_bytes(&self.header_buf);
        if !header.is_valid() {
            warn!(magic = format_args!("{:#06x}", header.magic), "bad magic, resynchronizing");
            self.stats.resyncs += 1;
            self.state = State::Resync;
            return Ok(Progress::Advanced);
        }

        self.stats.frames += 1;
        debug!(
            command = usbfs_frame::command_name(header.command),
            code = header.command,
            request_id = header.request_id,
            size = header.size,
            "frame header"
        );
        self.state = State::HeaderValid(header);
        Ok(Progress::Advanced)
    }

    fn start_command<T: Transport + ?Sized>(
        &mut self,
        header: Header,
        transport: &mut T,
    ) -> Result<Progress> {
        let route = self.dispatcher.route(header.command);
        if route == Route::Drain {
            debug!(code = header.command, size = header.size, "no handler, draining");
            self.stats.drained += 1;
        }

        if header.size == 0 {
            // A zero-length command gets exactly one handler call.
            self.state = State::Idle;
            if let Route::Handle(command) = route {
                let request = Request {
                    command: header.command,
                    request_id: header.request_id,
                    declared_size: 0,
                    received: 0,
                    buffer: &[],
                };
                let mut out = Responder::new(&mut self.outbox, header.command, header.request_id);
                self.handlers.handle(command, &request, &mut out);
            }
            return Ok(Progress::Advanced);
        }

        self.window.begin(header.size);
        self.state = State::Streaming { header, route };
        Ok(Progress::Advanced)
    }

    fn poll_payload<T: Transport + ?Sized>(
        &mut self,
        header: Header,
        route: Route,
        transport: &mut T,
    ) -> Result<Progress> {
        if transport.available()? == 0 {
            return Ok(Progress::Pending);
        }
        let n = self.window.fill(transport)?;
        if n == 0 {
            return Ok(Progress::Pending);
        }
        trace!(
            received = self.window.received(),
            declared = header.size,
            buffered = self.window.buffered_len(),
            "payload chunk"
        );

        let mut route = route;
        match route {
            Route::Handle(command) => {
                if self.dispatch(command, header) {
                    self.window.consume();
                } else if self.window.is_full() && !self.window.is_complete() {
                    self.reject_overflow(command, header);
                    route = Route::Drain;
                }
            }
            Route::Drain => self.window.consume(),
        }

        self.state = if self.window.is_complete() {
            State::Idle
        } else {
            State::Streaming { header, route }
        };
        Ok(Progress::Advanced)
    }

    fn dispatch(&mut self, command: Command, header: Header) -> bool {
        let request = Request {
            command: header.command,
            request_id: header.request_id,
            declared_size: header.size,
            received: self.window.received(),
            buffer: self.window.buffered(),
        };
        let mut out = Responder::new(&mut self.outbox, header.command, header.request_id);
        self.handlers.handle(command, &request, &mut out)
    }

    /// The handler let the window fill without consuming: answer `er` once,
    /// drop the write stream and drain the rest of the payload.
    fn reject_overflow(&mut self, command: Command, header: Header) {
        warn!(
            command = command.name(),
            request_id = header.request_id,
            size = header.size,
            capacity = self.window.capacity(),
            "payload overflows receive window, rejecting"
        );
        self.stats.overflows += 1;
        self.handlers.abort();
        self.window.consume();
        Responder::new(&mut self.outbox, header.command, header.request_id).error();
    }

    fn poll_resync<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Progress> {
        if transport.available()? == 0 {
            debug!("resync complete");
            self.state = State::Idle;
            return Ok(Progress::Advanced);
        }
        let mut scratch = [0u8; HEADER_SIZE];
        if transport.read(&mut scratch)? == 0 {
            return Ok(Progress::Pending);
        }
        Ok(Progress::Advanced)
    }
}
