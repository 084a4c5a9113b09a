//! Scripted in-memory endpoint.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, TransportError};
use crate::traits::{Readiness, ResetSignal, Transport};

/// Full-speed USB bulk packet size.
pub const DEFAULT_PACKET_SIZE: usize = 64;

/// In-memory transport that behaves like a vendor endpoint.
///
/// Inbound bytes are handed out at most one packet per `read()`, so multi-chunk
/// delivery paths get exercised. Outbound bytes are collected for inspection.
/// After [`MemoryTransport::close`], the endpoint reports
/// [`TransportError::Closed`] once the inbound queue is drained.
#[derive(Debug)]
pub struct MemoryTransport {
    inbound: BytesMut,
    outbound: BytesMut,
    packet_size: usize,
    send_limit: usize,
    send_stalled: bool,
    closed: bool,
    reset: ResetSignal,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            inbound: BytesMut::new(),
            outbound: BytesMut::new(),
            packet_size: DEFAULT_PACKET_SIZE,
            send_limit: usize::MAX,
            send_stalled: false,
            closed: false,
            reset: ResetSignal::new(),
        }
    }

    /// Limit how many bytes a single `read()` may return.
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size.max(1);
        self
    }

    /// Limit how many bytes a single `send()` accepts.
    pub fn with_send_limit(mut self, send_limit: usize) -> Self {
        self.send_limit = send_limit.max(1);
        self
    }

    /// Stop or resume taking outbound bytes, like a host that stops reading.
    pub fn stall_sends(&mut self, stalled: bool) {
        self.send_stalled = stalled;
    }

    /// Queue bytes as if the host had written them.
    pub fn push(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    /// Mark the host side as gone once queued bytes are consumed.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Bytes queued by the host and not yet read.
    pub fn pending(&self) -> usize {
        self.inbound.len()
    }

    /// Everything the device sent so far.
    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    /// Take everything the device sent so far.
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    /// Handle for raising a bus reset on this endpoint.
    pub fn reset_signal(&self) -> ResetSignal {
        self.reset.clone()
    }
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> Result<usize> {
        if self.inbound.is_empty() && self.closed {
            return Err(TransportError::Closed);
        }
        Ok(self.inbound.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.packet_size).min(self.inbound.len());
        buf[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.advance(n);
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        if self.send_stalled {
            return Ok(0);
        }
        let n = buf.len().min(self.send_limit);
        self.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn reset_requested(&mut self) -> bool {
        self.reset.take()
    }

    fn readiness(&mut self) -> Result<Readiness> {
        let mut ready = Readiness::NONE;
        if self.available()? > 0 {
            ready = ready | Readiness::READABLE;
        }
        if !self.send_stalled {
            ready = ready | Readiness::WRITABLE;
        }
        Ok(ready)
    }
}
