use iotdcp_frame::{DEFAULT_PORT, MAX_MAX_PAYLOAD};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("iotdcp {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: iotdcp");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("IOTDCP_BUILD_TARGET").unwrap_or("unknown"));
    println!("profile: {}", option_env!("IOTDCP_BUILD_PROFILE").unwrap_or("unknown"));
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!(
        "features: device={}, async={}, cli=true",
        cfg!(feature = "device"),
        cfg!(feature = "async")
    );
    println!("default_port: {DEFAULT_PORT}");
    println!("max_payload_limit: {MAX_MAX_PAYLOAD}");

    Ok(SUCCESS)
}
