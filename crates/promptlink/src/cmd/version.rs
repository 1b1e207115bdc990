use promptlink_frame::{DEFAULT_MAX_BUFFER, DEFAULT_TERMINATOR};
use promptlink_transport::DEFAULT_BAUD_RATE;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("promptlink {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: promptlink");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("PROMPTLINK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("default_baud: {DEFAULT_BAUD_RATE}");
    println!("default_terminator: {DEFAULT_TERMINATOR:?}");
    println!("max_buffer: {DEFAULT_MAX_BUFFER}");

    Ok(SUCCESS)
}
