use std::ops::BitOr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::Result;

const WAIT_STEP: Duration = Duration::from_millis(1);

/// A vendor endpoint as seen by the device engine.
///
/// Implementations must never block in `available()`. `read()` is only called
/// after `available()` reported data, and may return fewer bytes than the
/// buffer holds. `send()` must not block either: it accepts what fits right
/// now, possibly nothing, and the caller keeps the rest queued until
/// [`Readiness::WRITABLE`] comes back.
pub trait Transport {
    /// Number of bytes that can be read right now.
    fn available(&mut self) -> Result<usize>;

    /// Read up to `buf.len()` bytes. Returning 0 is a partial read, not EOF.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Queue bytes for the host. Returns how many were accepted; 0 means the
    /// host is not draining.
    fn send(&mut self, buf: &[u8]) -> Result<usize>;

    /// Out-of-band reset signal. Reading it clears it.
    fn reset_requested(&mut self) -> bool {
        false
    }

    /// Current readiness bits of the endpoint.
    fn readiness(&mut self) -> Result<Readiness> {
        let mut ready = Readiness::WRITABLE;
        if self.available()? > 0 {
            ready = ready | Readiness::READABLE;
        }
        Ok(ready)
    }

    /// Block until data is available or `timeout` elapses.
    ///
    /// Returns `true` when data is available.
    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.available()? > 0 {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep((deadline - now).min(WAIT_STEP));
        }
    }

    /// Block until the endpoint takes output or `timeout` elapses.
    ///
    /// Returns `true` when a send would make progress.
    fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.readiness()?.is_writable() {
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep((deadline - now).min(WAIT_STEP));
        }
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn available(&mut self) -> Result<usize> {
        (**self).available()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).send(buf)
    }

    fn reset_requested(&mut self) -> bool {
        (**self).reset_requested()
    }

    fn readiness(&mut self) -> Result<Readiness> {
        (**self).readiness()
    }

    fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_readable(timeout)
    }

    fn wait_writable(&mut self, timeout: Duration) -> Result<bool> {
        (**self).wait_writable(timeout)
    }
}

/// Readiness bits reported by a pollable endpoint.
///
/// Bit values follow the stream poll convention (`1` readable, `4` writable).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness(u8);

impl Readiness {
    /// Nothing is ready.
    pub const NONE: Self = Self(0);
    /// At least one byte can be read.
    pub const READABLE: Self = Self(1);
    /// The endpoint can take more outbound bytes.
    pub const WRITABLE: Self = Self(4);

    /// Raw bit pattern.
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_readable(self) -> bool {
        self.0 & Self::READABLE.0 != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & Self::WRITABLE.0 != 0
    }
}

impl BitOr for Readiness {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Shared bus-reset flag.
///
/// The side that observes the reset (a USB interrupt, a control request, a
/// test) calls [`ResetSignal::trigger`]; the transport hands it to the driver
/// through [`Transport::reset_requested`].
#[derive(Debug, Clone, Default)]
pub struct ResetSignal {
    flag: Arc<AtomicBool>,
}

impl ResetSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the reset flag.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Read and clear the reset flag.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle {
        writable: bool,
    }

    impl Transport for Idle {
        fn available(&mut self) -> Result<usize> {
            Ok(0)
        }

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }

        fn send(&mut self, buf: &[u8]) -> Result<usize> {
            Ok(if self.writable { buf.len() } else { 0 })
        }

        fn readiness(&mut self) -> Result<Readiness> {
            Ok(if self.writable {
                Readiness::WRITABLE
            } else {
                Readiness::NONE
            })
        }
    }

    #[test]
    fn default_readiness_tracks_available() {
        struct Quiet;
        impl Transport for Quiet {
            fn available(&mut self) -> Result<usize> {
                Ok(0)
            }
            fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
                Ok(0)
            }
            fn send(&mut self, buf: &[u8]) -> Result<usize> {
                Ok(buf.len())
            }
        }

        let ready = Quiet.readiness().unwrap();
        assert!(!ready.is_readable());
        assert!(ready.is_writable());
    }

    #[test]
    fn wait_readable_times_out_without_data() {
        let mut t = Idle { writable: true };
        assert!(!t.wait_readable(Duration::from_millis(5)).unwrap());
    }

    #[test]
    fn wait_writable_follows_readiness() {
        assert!(Idle { writable: true }
            .wait_writable(Duration::from_millis(5))
            .unwrap());

        let mut stalled = Idle { writable: false };
        let started = Instant::now();
        assert!(!stalled.wait_writable(Duration::from_millis(5)).unwrap());
        assert!(started.elapsed() >= Duration::from_millis(5));
        assert_eq!(stalled.send(b"x").unwrap(), 0);
    }

    #[test]
    fn readiness_bits_combine() {
        let both = Readiness::READABLE | Readiness::WRITABLE;
        assert_eq!(both.bits(), 5);
        assert!(both.is_readable() && both.is_writable());
        assert!(!Readiness::NONE.is_readable());
    }

    #[test]
    fn reset_signal_is_consumed_once() {
        let signal = ResetSignal::new();
        let observer = signal.clone();
        assert!(!observer.take());
        signal.trigger();
        assert!(observer.take());
        assert!(!observer.take());
    }
}
