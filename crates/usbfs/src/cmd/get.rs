use serde::Serialize;

use crate::cmd::{connect, GetArgs};
use crate::exit::{host_error, io_error, CliResult, SUCCESS};
use crate::output::{print_raw, print_record, OutputFormat};

#[derive(Serialize)]
struct GetOutput {
    remote: String,
    local: String,
    bytes: usize,
}

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    let contents = client
        .read_file(&args.remote)
        .map_err(|err| host_error("read failed", err))?;

    let Some(local) = &args.output else {
        print_raw(&contents);
        return Ok(SUCCESS);
    };
    std::fs::write(local, &contents)
        .map_err(|err| io_error(&format!("failed writing {}", local.display()), err))?;

    let out = GetOutput {
        remote: args.remote.clone(),
        local: local.display().to_string(),
        bytes: contents.len(),
    };
    let fields = [
        ("remote", out.remote.clone()),
        ("local", out.local.clone()),
        ("bytes", out.bytes.to_string()),
    ];
    print_record(&out, &fields, format);
    Ok(SUCCESS)
}
