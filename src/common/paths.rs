//! Socket and configuration paths
//!
//! The runtime listens on a well-known filesystem socket. Harness
//! configuration lives in a platform-appropriate directory.

use std::path::PathBuf;

/// Name used for the configuration and data directories
const APP_NAME: &str = "cortex-conformance";

/// Default location of the runtime socket
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/cortex.sock";

/// Environment variable that overrides the socket location
pub const SOCKET_ENV: &str = "CORTEX_SOCKET";

/// Get the runtime socket path
///
/// `CORTEX_SOCKET` wins over the built-in default.
pub fn socket_path() -> PathBuf {
    std::env::var_os(SOCKET_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/cortex-conformance/`
/// - macOS: `~/Library/Application Support/cortex-conformance/`
/// - Windows: `%APPDATA%\cortex-conformance\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
