use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use usbfs_frame::FrameConfig;
use usbfs_host::Client;

use crate::exit::{host_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod fileops;
pub mod get;
pub mod launch;
pub mod ls;
pub mod next;
pub mod ping;
pub mod put;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve a directory as the device filesystem on a socket endpoint.
    Serve(ServeArgs),
    /// Send a heartbeat and report the round trip.
    Ping(ConnectArgs),
    /// List a device directory.
    Ls(LsArgs),
    /// Download a file from the device.
    Get(GetArgs),
    /// Upload a file to the device.
    Put(PutArgs),
    /// Delete a file or empty directory on the device.
    Rm(PathArgs),
    /// Copy a file on the device.
    Cp(PairArgs),
    /// Move or rename a file on the device.
    Mv(PairArgs),
    /// Create a directory on the device.
    Mkdir(PathArgs),
    /// Select the program the device runs on its next boot.
    Launch(LaunchArgs),
    /// Consume the next-program marker from a device root (boot side).
    NextProgram(NextProgramArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Ping(args) => ping::run(args, format),
        Command::Ls(args) => ls::run(args, format),
        Command::Get(args) => get::run(args, format),
        Command::Put(args) => put::run(args, format),
        Command::Rm(args) => fileops::remove(args, format),
        Command::Cp(args) => fileops::copy(args, format),
        Command::Mv(args) => fileops::rename(args, format),
        Command::Mkdir(args) => fileops::make_dir(args, format),
        Command::Launch(args) => launch::run(args, format),
        Command::NextProgram(args) => next::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ServeMode {
    /// Engine runs inline on the main thread.
    Blocking,
    /// Engine runs on a dedicated worker thread.
    Worker,
    /// Engine runs as a task on a current-thread async runtime.
    Cooperative,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind.
    #[arg(env = "USBFS_SOCKET")]
    pub socket: PathBuf,
    /// Directory served as the device root.
    #[arg(long, value_name = "DIR", env = "USBFS_ROOT", default_value = ".")]
    pub root: PathBuf,
    /// Execution driver.
    #[arg(long, value_enum, env = "USBFS_MODE", default_value = "blocking")]
    pub mode: ServeMode,
    /// Receive window capacity in bytes.
    #[arg(long, env = "USBFS_WINDOW", default_value_t = usbfs_device::DEFAULT_WINDOW_CAPACITY)]
    pub window: usize,
    /// Chunk size for file streaming and copies.
    #[arg(long, env = "USBFS_CHUNK", default_value_t = usbfs_device::DEFAULT_IO_CHUNK_SIZE)]
    pub chunk: usize,
    /// Disable the launch-next command.
    #[arg(long)]
    pub no_launch: bool,
    /// Device path of the next-program marker.
    #[arg(long, value_name = "PATH", default_value = usbfs_device::DEFAULT_MARKER)]
    pub marker: String,
    /// Driver poll interval (e.g. 1ms, 50ms).
    #[arg(long, default_value = "1ms")]
    pub poll_interval: String,
    /// Exit after the first host session ends.
    #[arg(long)]
    pub once: bool,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Socket path of the device endpoint.
    #[arg(env = "USBFS_SOCKET")]
    pub socket: PathBuf,
    /// Response timeout (e.g. 5s, 500ms).
    #[arg(long, env = "USBFS_TIMEOUT", default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct LsArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Directory to list. Default: the root.
    pub path: Option<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Device path to read.
    pub remote: String,
    /// Write to this file instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PutArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Local file to upload.
    pub local: PathBuf,
    /// Destination device path.
    pub remote: String,
}

#[derive(Args, Debug)]
pub struct PathArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Device path.
    pub path: String,
}

#[derive(Args, Debug)]
pub struct PairArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Source device path.
    pub source: String,
    /// Destination device path.
    pub dest: String,
}

#[derive(Args, Debug)]
pub struct LaunchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Program path to run on next boot.
    pub program: String,
}

#[derive(Args, Debug)]
pub struct NextProgramArgs {
    /// Device root directory.
    #[arg(long, value_name = "DIR", env = "USBFS_ROOT", default_value = ".")]
    pub root: PathBuf,
    /// Device path of the marker.
    #[arg(long, value_name = "PATH", default_value = usbfs_device::DEFAULT_MARKER)]
    pub marker: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub type SocketClient = Client<UnixStream, UnixStream>;

/// Connect to the device endpoint with the requested response timeout.
pub fn connect(args: &ConnectArgs) -> CliResult<SocketClient> {
    let timeout = parse_duration(&args.timeout)?;
    let config = FrameConfig {
        read_timeout: Some(timeout),
        write_timeout: Some(timeout),
        ..FrameConfig::default()
    };
    Client::connect(&args.socket, config).map_err(|err| host_error("connect failed", err))
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }
}
