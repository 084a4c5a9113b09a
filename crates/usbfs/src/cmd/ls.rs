use crate::cmd::{connect, LsArgs};
use crate::exit::{host_error, CliResult, SUCCESS};
use crate::output::{print_listing, OutputFormat};

pub fn run(args: LsArgs, format: OutputFormat) -> CliResult<i32> {
    let mut client = connect(&args.connect)?;
    let listing = client
        .list_dir(args.path.as_deref())
        .map_err(|err| host_error("list failed", err))?;
    print_listing(&listing, format);
    Ok(SUCCESS)
}
