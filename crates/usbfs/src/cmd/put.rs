use serde::Serialize;

use crate::cmd::{connect, PutArgs};
use crate::exit::{host_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct PutOutput {
    local: String,
    remote: String,
    bytes: usize,
}

pub fn run(args: PutArgs, format: OutputFormat) -> CliResult<i32> {
    let contents = std::fs::read(&args.local)
        .map_err(|err| io_error(&format!("failed reading {}", args.local.display()), err))?;
    // Path, separator and contents share one u32-sized frame.
    if contents.len() + args.remote.len() + 1 > u32::MAX as usize {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} is too large for one frame", args.local.display()),
        ));
    }

    let mut client = connect(&args.connect)?;
    client
        .write_file(&args.remote, &contents)
        .map_err(|err| host_error("write failed", err))?;

    let out = PutOutput {
        local: args.local.display().to_string(),
        remote: args.remote.clone(),
        bytes: contents.len(),
    };
    let fields = [
        ("local", out.local.clone()),
        ("remote", out.remote.clone()),
        ("bytes", out.bytes.to_string()),
    ];
    print_record(&out, &fields, format);
    Ok(SUCCESS)
}
