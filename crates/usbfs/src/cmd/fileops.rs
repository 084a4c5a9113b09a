//! Single-shot device file operations: rm, cp, mv, mkdir.

use serde::Serialize;

use crate::cmd::{connect, PairArgs, PathArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_record, OutputFormat};

#[derive(Serialize)]
struct OpOutput<'a> {
    op: &'static str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    dest: Option<&'a str>,
    ok: bool,
}

pub fn remove(args: PathArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    client
        .delete(&args.path)
        .map_err(|err| host_error("rm failed", err))?;
    report("rm", &args.path, None, format);
    Ok(SUCCESS)
}

pub fn make_dir(args: PathArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    client
        .make_dir(&args.path)
        .map_err(|err| host_error("mkdir failed", err))?;
    report("mkdir", &args.path, None, format);
    Ok(SUCCESS)
}

pub fn copy(args: PairArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    client
        .duplicate(&args.source, &args.dest)
        .map_err(|err| host_error("cp failed", err))?;
    report("cp", &args.source, Some(&args.dest), format);
    Ok(SUCCESS)
}

pub fn rename(args: PairArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    client
        .rename(&args.source, &args.dest)
        .map_err(|err| host_error("mv failed", err))?;
    report("mv", &args.source, Some(&args.dest), format);
    Ok(SUCCESS)
}

fn report(op: &'static str, path: &str, dest: Option<&str>, format: OutputFormat) {
    let out = OpOutput {
        op,
        path,
        dest,
        ok: true,
    };
    let mut fields = vec![("op", op.to_string()), ("path", path.to_string())];
    if let Some(dest) = dest {
        fields.push(("dest", dest.to_string()));
    }
    fields.push(("ok", "true".to_string()));
    print_record(&out, &fields, format);
}
