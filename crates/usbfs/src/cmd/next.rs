use serde::Serialize;
use usbfs_device::{take_next_program, LocalFs};

use crate::cmd::NextProgramArgs;
use crate::exit::{fs_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct NextOutput {
    program: Option<String>,
}

/// Boot side of LaunchNext. The marker is deleted even if nothing usable was
/// in it; an absent marker prints nothing in raw mode.
pub fn run(args: NextProgramArgs, format: OutputFormat) -> CliResult<i32> {
    let fs = LocalFs::new(&args.root);
    let program =
        take_next_program(&fs, &args.marker).map_err(|err| fs_error("marker read failed", err))?;

    let fields: Vec<(&str, String)> = program
        .iter()
        .map(|program| ("program", program.clone()))
        .collect();
    print_record(&NextOutput { program }, &fields, format);
    Ok(SUCCESS)
}
