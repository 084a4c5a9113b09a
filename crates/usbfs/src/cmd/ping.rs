use std::time::Instant;

use serde::Serialize;

use crate::cmd::{connect, ConnectArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct PingOutput {
    socket: String,
    alive: bool,
    latency_ms: f64,
}

pub fn run(args: ConnectArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args)?;
    let started = Instant::now();
    client
        .heartbeat()
        .map_err(|err| host_error("heartbeat failed", err))?;
    let latency_ms = (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let out = PingOutput {
        socket: args.socket.display().to_string(),
        alive: true,
        latency_ms,
    };
    let fields = [
        ("socket", out.socket.clone()),
        ("alive", out.alive.to_string()),
        ("latency_ms", out.latency_ms.to_string()),
    ];
    print_record(&out, &fields, format);
    Ok(SUCCESS)
}
