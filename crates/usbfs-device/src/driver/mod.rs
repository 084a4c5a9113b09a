//! Execution drivers.
//!
//! Every driver runs the same [`Engine`]; they only differ in how they wait
//! when the engine reports [`Progress::Pending`].

mod blocking;
#[cfg(feature = "async")]
mod cooperative;
mod worker;

pub use blocking::run_blocking;
#[cfg(feature = "async")]
pub use cooperative::run_cooperative;
pub use worker::{spawn_worker, Outcome, Worker};

use tracing::info;
use usbfs_transport::Transport;

use crate::engine::{Engine, Progress};
use crate::error::Result;
use crate::fs::FileSystem;

/// Why a driver loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The stop flag was raised.
    Stopped,
    /// The host closed the link.
    Closed,
}

/// One engine step, honouring a pending reset signal first.
pub fn step<F: FileSystem, T: Transport + ?Sized>(
    engine: &mut Engine<F>,
    transport: &mut T,
) -> Result<Progress> {
    if transport.reset_requested() {
        info!("reset signalled, reinitializing engine");
        engine.reset();
        engine.discard_input(transport)?;
        return Ok(Progress::Advanced);
    }
    engine.poll(transport)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use usbfs_frame::{Status, HEADER_SIZE};
    use usbfs_transport::MemoryTransport;

    use super::*;
    use crate::config::{DriverConfig, EngineConfig};
    use crate::engine::tests::{request, responses};
    use crate::fs::tests::scratch_root;
    use crate::fs::LocalFs;

    /// A session touching every command, as raw host bytes.
    pub(crate) fn scripted_session() -> Vec<u8> {
        let mut wire = Vec::new();
        wire.extend(request(1, 1, b""));
        wire.extend(request(4102, 2, b"/lib\0"));
        wire.extend(request(4098, 3, b"/lib/a.txt\0hello driver"));
        wire.extend(request(4100, 4, b"/lib/a.txt\0/b.txt\0"));
        wire.extend(request(4096, 5, b"/lib\0"));
        wire.extend(request(4097, 6, b"/b.txt\0"));
        wire.extend(request(9999, 7, b"ignored"));
        wire.extend(request(4101, 8, b"/b.txt\0/c.txt\0"));
        wire.extend(request(4099, 9, b"/lib/a.txt\0"));
        wire.extend(request(4096, 10, b""));
        wire
    }

    pub(crate) fn scripted_transport() -> MemoryTransport {
        let mut t = MemoryTransport::new().with_packet_size(7);
        t.push(&scripted_session());
        t.close();
        t
    }

    pub(crate) fn scripted_engine(tag: &str) -> (Engine<LocalFs>, std::path::PathBuf) {
        let root = scratch_root(tag);
        (Engine::new(LocalFs::new(&root), EngineConfig::default()), root)
    }

    #[test]
    fn blocking_driver_runs_session_to_close() {
        let (mut engine, root) = scripted_engine("drv-blocking");
        let mut t = scripted_transport();

        let exit = run_blocking(
            &mut engine,
            &mut t,
            &DriverConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(exit, Exit::Closed);

        let frames = responses(t.outbound());
        // Unknown command 9999 gets no answer.
        assert_eq!(frames.len(), 9);
        assert_eq!(frames[4].payload.as_ref(), b"/lib\nfa.txt");
        assert_eq!(frames[5].payload.as_ref(), b"hello driver");
        assert_eq!(frames[8].payload.as_ref(), b"/\nfc.txt\ndlib");
        assert_eq!(Status::parse(&frames[6].payload), Some(Status::Ok));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn stop_flag_is_checked_between_steps() {
        let (mut engine, root) = scripted_engine("drv-stop");
        let mut t = scripted_transport();

        let exit = run_blocking(
            &mut engine,
            &mut t,
            &DriverConfig::default(),
            &AtomicBool::new(true),
        )
        .unwrap();
        assert_eq!(exit, Exit::Stopped);
        assert!(t.outbound().is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn reset_signal_reinitializes_engine() {
        let (mut engine, root) = scripted_engine("drv-reset");
        let mut t = MemoryTransport::new();
        let mut partial = request(4098, 1, b"/x.txt\0hello world");
        partial.truncate(partial.len() - 4);
        t.push(&partial);
        engine.run_until_pending(&mut t).unwrap();
        assert!(engine.write_in_progress());

        t.reset_signal().trigger();
        t.push(b"orld");
        assert_eq!(step(&mut engine, &mut t).unwrap(), Progress::Advanced);
        assert!(!engine.write_in_progress());
        assert_eq!(t.pending(), 0);

        t.push(&request(1, 2, b""));
        t.close();
        let exit = run_blocking(
            &mut engine,
            &mut t,
            &DriverConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(exit, Exit::Closed);
        let frames = responses(t.outbound());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].request_id(), 2);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn blocking_driver_holds_input_while_host_is_not_reading() {
        let (mut engine, root) = scripted_engine("drv-stalled");
        let mut t = MemoryTransport::new();
        t.push(&request(1, 1, b""));
        t.push(&request(1, 2, b""));
        t.stall_sends(true);

        let stop = Arc::new(AtomicBool::new(false));
        let stopper = {
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                stop.store(true, Ordering::Release);
            })
        };
        let exit = run_blocking(&mut engine, &mut t, &DriverConfig::default(), &stop).unwrap();
        stopper.join().unwrap();
        assert_eq!(exit, Exit::Stopped);
        assert!(engine.has_pending_output());
        assert!(t.outbound().is_empty());
        // The second request stays unread until the first answer is out.
        assert_eq!(t.pending(), HEADER_SIZE);

        t.stall_sends(false);
        t.close();
        let exit = run_blocking(
            &mut engine,
            &mut t,
            &DriverConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(exit, Exit::Closed);
        let ids: Vec<u32> = responses(t.outbound()).iter().map(|f| f.request_id()).collect();
        assert_eq!(ids, vec![1, 2]);
        let _ = std::fs::remove_dir_all(&root);
    }
}
