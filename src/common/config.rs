//! Configuration file handling

use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{self, config_path};
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Runtime connection settings
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Harness settings
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Out-of-process client settings, keyed by client id
    #[serde(default)]
    pub clients: HashMap<String, ScriptClientConfig>,
}

/// How to reach the runtime
#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the runtime socket (`CORTEX_SOCKET` overrides the default)
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Deadline for one request/response exchange
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl RuntimeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Replace the socket path with a non-empty `CORTEX_SOCKET` value
    ///
    /// The environment wins over the config file; `--socket` wins over both.
    pub fn override_socket(&mut self, value: Option<OsString>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.socket_path = PathBuf::from(value);
        }
    }
}

fn default_socket_path() -> PathBuf {
    paths::socket_path()
}

fn default_request_timeout() -> u64 {
    60
}

/// Harness settings
#[derive(Debug, Deserialize)]
pub struct HarnessConfig {
    /// Directory containing `test_<name>.json` suite files
    #[serde(default = "default_suites_dir")]
    pub suites_dir: PathBuf,

    /// Address the fixture site binds to
    #[serde(default = "default_fixture_host")]
    pub fixture_host: IpAddr,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            suites_dir: default_suites_dir(),
            fixture_host: default_fixture_host(),
        }
    }
}

fn default_suites_dir() -> PathBuf {
    PathBuf::from("suites")
}

fn default_fixture_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// Settings for a client driven through a subprocess
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ScriptClientConfig {
    /// Interpreter executable, resolved through PATH
    pub interpreter: String,

    /// Working directory of the client package
    pub workdir: PathBuf,

    /// Wall-clock limit for one driver run
    #[serde(default = "default_script_timeout")]
    pub timeout_secs: u64,
}

impl ScriptClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Built-in settings for the known script clients
    pub fn builtin(client: &str) -> Option<Self> {
        let (interpreter, workdir) = match client {
            "python" => ("python3", "clients/python"),
            "typescript" => ("node", "clients/typescript"),
            _ => return None,
        };
        Some(Self {
            interpreter: interpreter.to_string(),
            workdir: PathBuf::from(workdir),
            timeout_secs: default_script_timeout(),
        })
    }
}

fn default_script_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from an explicit path, or the default config file
    ///
    /// Returns default configuration if no file exists
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => config_path().filter(|p| p.exists()),
        };

        let mut config = match path {
            Some(path) => {
                let content =
                    std::fs::read_to_string(&path).map_err(|e| super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };

        config
            .runtime
            .override_socket(std::env::var_os(paths::SOCKET_ENV));
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Get settings for a script client
    ///
    /// Explicit configuration wins over the built-in defaults
    pub fn script_client(&self, client: &str) -> Option<ScriptClientConfig> {
        self.clients
            .get(client)
            .cloned()
            .or_else(|| ScriptClientConfig::builtin(client))
    }
}
