use serde::Serialize;

use crate::cmd::{connect, LaunchArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct LaunchOutput<'a> {
    next_program: &'a str,
}

pub fn run(args: LaunchArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    client
        .launch_next(&args.program)
        .map_err(|err| host_error("launch failed", err))?;
    print_record(
        &LaunchOutput {
            next_program: &args.program,
        },
        &[("next_program", args.program.clone())],
        format,
    );
    Ok(SUCCESS)
}
