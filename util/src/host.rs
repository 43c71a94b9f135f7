//! Host platform utility functions

use std::env;
use std::path::PathBuf;

/// Name of the environment variable pointing at the software root directory.
pub const SW_ROOT_ENV_VAR: &str = "LOC_SW_ROOT";

/// Get the software root directory, which contains the `params`, `maps` and
/// `sessions` directories.
pub fn get_loc_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get a human readable description of the host this executable runs on.
pub fn get_host_info() -> String {
    format!(
        "{} ({}), {} worker threads available",
        env::consts::OS,
        env::consts::ARCH,
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    )
}
