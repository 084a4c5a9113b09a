use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use usbfs_device::{
    run_blocking, run_cooperative, spawn_worker, DriverConfig, Engine, EngineConfig, EngineStats,
    Exit, LocalFs,
};
use usbfs_transport::{SocketListener, SocketTransport};

use crate::cmd::{parse_duration, ServeArgs, ServeMode};
use crate::exit::{device_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_record, OutputFormat};

/// How long `accept` blocks before the stop flag is checked again.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

#[derive(Serialize)]
struct SessionOutput {
    session: u64,
    exit: &'static str,
    frames: u64,
    drained: u64,
    overflows: u64,
    resyncs: u64,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = engine_config(&args)?;
    let driver = DriverConfig {
        poll_interval: parse_duration(&args.poll_interval)?,
    };
    let root = std::fs::canonicalize(&args.root)
        .map_err(|err| io_error(&format!("device root {}", args.root.display()), err))?;
    if !root.is_dir() {
        return Err(CliError::new(
            USAGE,
            format!("device root {} is not a directory", root.display()),
        ));
    }

    let listener =
        SocketListener::bind(&args.socket).map_err(|err| transport_error("bind failed", err))?;
    let stop = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(Arc::clone(&stop))?;

    info!(
        root = %root.display(),
        mode = ?args.mode,
        window = config.window_capacity,
        "serving device filesystem"
    );
    let mut engine = Engine::new(LocalFs::new(&root), config);
    let mut sessions = 0u64;

    while !stop.load(Ordering::SeqCst) {
        let transport = match listener.poll_accept(ACCEPT_POLL) {
            Ok(Some(transport)) => transport,
            Ok(None) => continue,
            Err(err) => return Err(transport_error("accept failed", err)),
        };
        sessions += 1;
        let before = engine.stats();
        engine.reset();

        let (returned, exit) = serve_session(engine, transport, args.mode, &driver, &stop)?;
        engine = returned;
        info!(session = sessions, exit = ?exit, "host session ended");
        print_session(sessions, exit, delta(before, engine.stats()), format);

        if args.once {
            break;
        }
    }

    Ok(SUCCESS)
}

fn engine_config(args: &ServeArgs) -> CliResult<EngineConfig> {
    if args.window == 0 || args.chunk == 0 {
        return Err(CliError::new(USAGE, "--window and --chunk must be greater than zero"));
    }
    if args.marker.is_empty() {
        return Err(CliError::new(USAGE, "--marker must not be empty"));
    }
    Ok(EngineConfig {
        window_capacity: args.window,
        io_chunk_size: args.chunk,
        boot_marker: (!args.no_launch).then(|| args.marker.clone()),
    })
}

fn serve_session(
    mut engine: Engine<LocalFs>,
    mut transport: SocketTransport,
    mode: ServeMode,
    driver: &DriverConfig,
    stop: &Arc<AtomicBool>,
) -> CliResult<(Engine<LocalFs>, Exit)> {
    let (engine, exit) = match mode {
        ServeMode::Blocking => {
            let exit = run_blocking(&mut engine, &mut transport, driver, stop);
            (engine, exit)
        }
        ServeMode::Cooperative => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .map_err(|err| io_error("runtime setup failed", err))?;
            let exit = runtime.block_on(run_cooperative(&mut engine, &mut transport, driver, stop));
            (engine, exit)
        }
        ServeMode::Worker => {
            let worker = spawn_worker(engine, transport, driver.clone())
                .map_err(|err| device_error("worker failed", err))?;
            while !worker.is_finished() {
                if stop.load(Ordering::SeqCst) {
                    worker.stop();
                }
                std::thread::sleep(driver.poll_interval.max(Duration::from_millis(10)));
            }
            let (engine, _transport, exit) = worker
                .join()
                .map_err(|err| device_error("worker failed", err))?;
            (engine, exit)
        }
    };
    Ok((engine, session_exit(exit)))
}

/// A broken session does not take the server down.
fn session_exit(exit: usbfs_device::Result<Exit>) -> Exit {
    exit.unwrap_or_else(|err| {
        warn!(error = %err, "host session failed");
        Exit::Closed
    })
}

fn delta(before: EngineStats, after: EngineStats) -> EngineStats {
    EngineStats {
        frames: after.frames - before.frames,
        drained: after.drained - before.drained,
        overflows: after.overflows - before.overflows,
        resyncs: after.resyncs - before.resyncs,
    }
}

fn print_session(session: u64, exit: Exit, stats: EngineStats, format: OutputFormat) {
    let out = SessionOutput {
        session,
        exit: match exit {
            Exit::Stopped => "stopped",
            Exit::Closed => "closed",
        },
        frames: stats.frames,
        drained: stats.drained,
        overflows: stats.overflows,
        resyncs: stats.resyncs,
    };
    let fields = [
        ("session", out.session.to_string()),
        ("exit", out.exit.to_string()),
        ("frames", out.frames.to_string()),
        ("drained", out.drained.to_string()),
        ("overflows", out.overflows.to_string()),
        ("resyncs", out.resyncs.to_string()),
    ];
    print_record(&out, &fields, format);
}

fn install_ctrlc_handler(stop: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
