use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("usbfs {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: usbfs");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("USBFS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "features: host={}, async={}, cli=true",
        cfg!(feature = "host"),
        cfg!(feature = "async")
    );
    println!("window_default: {}", usbfs_device::DEFAULT_WINDOW_CAPACITY);
    println!("io_chunk_default: {}", usbfs_device::DEFAULT_IO_CHUNK_SIZE);

    Ok(SUCCESS)
}
