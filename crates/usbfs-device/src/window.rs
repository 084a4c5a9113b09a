use std::ops::Range;

use usbfs_transport::Transport;

use crate::error::Result;

/// Bounded buffer holding the payload bytes of the command in flight.
///
/// `received` counts every byte pulled from the transport for the current
/// command; `buffered` counts the bytes still sitting in the window because
/// the handler has not consumed them yet.
#[derive(Debug)]
pub struct ReceiveWindow {
    buf: Box<[u8]>,
    declared: u32,
    received: u32,
    buffered: usize,
}

impl ReceiveWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            declared: 0,
            received: 0,
            buffered: 0,
        }
    }

    /// Start accumulating a command that declared `declared` payload bytes.
    pub fn begin(&mut self, declared: u32) {
        self.declared = declared;
        self.received = 0;
        self.buffered = 0;
    }

    pub fn reset(&mut self) {
        self.begin(0);
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn buffered_len(&self) -> usize {
        self.buffered
    }

    /// Bytes awaiting handler consumption.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[..self.buffered]
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.declared
    }

    pub fn is_full(&self) -> bool {
        self.buffered == self.buf.len()
    }

    /// Window slots the next read may fill.
    ///
    /// The end is `min(capacity, declared - (received - buffered))`, so a read
    /// never pulls bytes that belong to the next frame.
    pub fn next_span(&self) -> Range<usize> {
        let outstanding_from_start =
            u64::from(self.declared) - (u64::from(self.received) - self.buffered as u64);
        let end = (self.buf.len() as u64).min(outstanding_from_start) as usize;
        self.buffered..end.max(self.buffered)
    }

    /// Read once from the transport into the free part of the window.
    pub fn fill<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<usize> {
        let span = self.next_span();
        if span.is_empty() {
            return Ok(0);
        }
        let room = span.len();
        let n = transport.read(&mut self.buf[span])?.min(room);
        // `room` is bounded by the outstanding declared size, itself a u32.
        self.received += n as u32;
        self.buffered += n;
        Ok(n)
    }

    /// The handler took everything buffered; the next read starts at offset 0.
    pub fn consume(&mut self) {
        self.buffered = 0;
    }
}

#[cfg(test)]
mod tests {
    use usbfs_transport::MemoryTransport;

    use super::*;

    #[test]
    fn span_is_bounded_by_declared_size() {
        let mut window = ReceiveWindow::new(1024);
        window.begin(12);
        assert_eq!(window.next_span(), 0..12);

        let mut t = MemoryTransport::new().with_packet_size(9);
        t.push(b"/x.txt\0hello");
        assert_eq!(window.fill(&mut t).unwrap(), 9);
        assert_eq!(window.next_span(), 9..12);
        assert_eq!(window.received(), 9);
        assert_eq!(window.buffered(), b"/x.txt\0he");

        window.consume();
        assert_eq!(window.next_span(), 0..3);
        assert_eq!(window.fill(&mut t).unwrap(), 3);
        assert_eq!(window.buffered(), b"llo");
        assert!(window.is_complete());
        assert!(window.next_span().is_empty());
    }

    #[test]
    fn span_is_bounded_by_capacity() {
        let mut window = ReceiveWindow::new(8);
        window.begin(20);
        assert_eq!(window.next_span(), 0..8);

        let mut t = MemoryTransport::new();
        t.push(&[7u8; 20]);
        assert_eq!(window.fill(&mut t).unwrap(), 8);
        assert!(window.is_full());
        assert!(window.next_span().is_empty());
        assert_eq!(window.fill(&mut t).unwrap(), 0);
        assert_eq!(t.pending(), 12);
    }

    #[test]
    fn unconsumed_bytes_accumulate() {
        let mut window = ReceiveWindow::new(16);
        window.begin(6);
        let mut t = MemoryTransport::new().with_packet_size(2);
        t.push(b"abcdef");

        window.fill(&mut t).unwrap();
        window.fill(&mut t).unwrap();
        assert_eq!(window.buffered(), b"abcd");
        assert_eq!(window.next_span(), 4..6);
    }

    #[test]
    fn empty_transport_read_is_partial() {
        let mut window = ReceiveWindow::new(16);
        window.begin(4);
        let mut t = MemoryTransport::new();
        assert_eq!(window.fill(&mut t).unwrap(), 0);
        assert_eq!(window.received(), 0);
    }
}
