use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("subipc {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: subipc");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("SUBIPC_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "profile: {}",
        option_env!("SUBIPC_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "frame_max_payload: {}",
        subipc_frame::DEFAULT_MAX_PAYLOAD
    );
    println!(
        "serialization: {} (default), {}",
        subipc_serial::Profile::Advanced,
        subipc_serial::Profile::Json
    );

    Ok(SUCCESS)
}
