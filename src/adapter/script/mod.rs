//! Out-of-process adapters
//!
//! A driver program is generated for each action, evaluated by the client's
//! interpreter inside the client's package directory, and expected to print
//! one line of canonical JSON (`null` for an absent result). Arguments are
//! embedded in the program as a JSON literal; the socket path is passed both
//! as the first program argument and through `CORTEX_SOCKET`.

pub mod python;
pub mod typescript;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::common::config::ScriptClientConfig;
use crate::common::paths::SOCKET_ENV;
use crate::common::{Error, Result};
use crate::testing::suite::Action;

use super::{ClientAdapter, ClientInfo, Invocation};

/// Longest stderr excerpt attached to a failure
const MAX_DIAGNOSTIC_LEN: usize = 2000;

/// Generates driver programs for one client runtime
pub trait Driver: Send + Sync {
    /// Interpreter flag that evaluates an inline program (`-c`, `-e`)
    fn eval_flag(&self) -> &'static str;

    /// Program performing the invocation and printing canonical JSON
    fn program(&self, invocation: &Invocation) -> Result<String>;

    /// Extra environment for the interpreter
    fn env(&self, _workdir: &Path) -> Vec<(&'static str, OsString)> {
        Vec::new()
    }
}

/// Adapter running generated programs in a subprocess
pub struct ScriptAdapter<D> {
    info: &'static ClientInfo,
    config: ScriptClientConfig,
    socket: PathBuf,
    driver: D,
}

impl<D: Driver> ScriptAdapter<D> {
    pub fn new(
        info: &'static ClientInfo,
        config: ScriptClientConfig,
        socket: &Path,
        driver: D,
    ) -> Self {
        Self {
            info,
            config,
            socket: socket.to_path_buf(),
            driver,
        }
    }

    fn unavailable(&self, reason: String) -> Error {
        Error::ClientUnavailable {
            client: self.info.id.to_string(),
            reason,
        }
    }

    /// Run the interpreter and return its stdout
    ///
    /// The child is killed if the deadline passes; tokio reaps it in the
    /// background so the caller returns at the deadline.
    async fn run(&self, program: &str) -> Result<String> {
        let client = self.info.id;
        let interpreter = which::which(&self.config.interpreter).map_err(|e| {
            self.unavailable(format!(
                "interpreter '{}' not found: {}",
                self.config.interpreter, e
            ))
        })?;

        if !self.config.workdir.is_dir() {
            return Err(self.unavailable(format!(
                "client directory {} does not exist",
                self.config.workdir.display()
            )));
        }

        let mut command = Command::new(&interpreter);
        command
            .arg(self.driver.eval_flag())
            .arg(program)
            .arg(&self.socket)
            .current_dir(&self.config.workdir)
            .env(SOCKET_ENV, &self.socket)
            .envs(self.driver.env(&self.config.workdir))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            client,
            interpreter = %interpreter.display(),
            workdir = %self.config.workdir.display(),
            "Spawning driver"
        );

        let child = command.spawn().map_err(|e| {
            Error::adapter_failed(
                client,
                format!("failed to spawn {}: {}", interpreter.display(), e),
            )
        })?;

        let timeout = self.config.timeout();
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::timeout(format!("{} driver", client), timeout))?
            .map_err(|e| Error::adapter_failed(client, format!("failed to collect output: {}", e)))?;

        tracing::info!(client, status = %output.status, "Driver exited");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::adapter_failed(
                client,
                format!("{}: {}", output.status, excerpt(stderr.trim())),
            ));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| Error::adapter_failed(client, format!("driver output is not UTF-8: {}", e)))
    }
}

#[async_trait]
impl<D: Driver> ClientAdapter for ScriptAdapter<D> {
    fn info(&self) -> &ClientInfo {
        self.info
    }

    async fn execute(&self, action: &Action) -> Result<Option<Value>> {
        let invocation = Invocation::from_action(action)?;
        let program = self.driver.program(&invocation)?;
        let stdout = self.run(&program).await?;
        parse_output(self.info.id, &stdout)
    }
}

/// Parse the driver's result line
///
/// Only the last non-empty line counts, so client libraries that print
/// progress do not break parsing.
pub fn parse_output(client: &str, stdout: &str) -> Result<Option<Value>> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or_else(|| Error::adapter_failed(client, "driver printed nothing"))?;

    match serde_json::from_str::<Value>(line) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(Error::adapter_failed(
            client,
            format!("unparsable output ({}): {}", e, excerpt(line)),
        )),
    }
}

/// JSON text of `args`, quoted as a string literal both Python and
/// JavaScript accept
pub fn args_literal(invocation: &Invocation) -> Result<String> {
    let args = serde_json::to_string(&Value::Object(invocation.params()?))?;
    Ok(serde_json::to_string(&args)?)
}

fn excerpt(text: &str) -> &str {
    if text.len() <= MAX_DIAGNOSTIC_LEN {
        return text;
    }
    let mut end = MAX_DIAGNOSTIC_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::get_client;
    use serde_json::json;

    /// Evaluates a fixed shell program
    struct ShellDriver(&'static str);

    impl Driver for ShellDriver {
        fn eval_flag(&self) -> &'static str {
            "-c"
        }

        fn program(&self, _invocation: &Invocation) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn adapter(script: &'static str, workdir: &Path, timeout_secs: u64) -> ScriptAdapter<ShellDriver> {
        let config = ScriptClientConfig {
            interpreter: "sh".into(),
            workdir: workdir.to_path_buf(),
            timeout_secs,
        };
        ScriptAdapter::new(
            get_client("python").unwrap(),
            config,
            Path::new("/tmp/test-cortex.sock"),
            ShellDriver(script),
        )
    }

    fn status_action() -> Action {
        Action::new("status", Default::default())
    }

    #[test]
    fn test_parse_output() {
        assert_eq!(
            parse_output("python", "{\"a\": 1}\n").unwrap(),
            Some(json!({"a": 1}))
        );
        assert_eq!(parse_output("python", "progress\nnull\n\n").unwrap(), None);
        assert!(matches!(
            parse_output("python", "").unwrap_err(),
            Error::AdapterFailed { .. }
        ));
        let err = parse_output("python", "Traceback (most recent call last)").unwrap_err();
        assert!(err.to_string().contains("Traceback"));
    }

    #[test]
    fn test_args_literal_is_quoted_json() {
        let action = Action::new(
            "map",
            json!({"domain": "it's \"quoted\""}).as_object().unwrap().clone(),
        );
        let literal = args_literal(&Invocation::from_action(&action).unwrap()).unwrap();
        assert!(literal.starts_with('"') && literal.ends_with('"'));

        let inner: String = serde_json::from_str(&literal).unwrap();
        let args: Value = serde_json::from_str(&inner).unwrap();
        assert_eq!(args["domain"], json!("it's \"quoted\""));
        assert_eq!(args["max_render"], json!(200));
    }

    #[tokio::test]
    async fn test_success_passes_socket_and_parses_json() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter(
            r#"printf '{"socket": "%s", "env": "%s"}\n' "$0" "$CORTEX_SOCKET""#,
            dir.path(),
            10,
        );

        let data = adapter.execute(&status_action()).await.unwrap().unwrap();
        assert_eq!(data["socket"], json!("/tmp/test-cortex.sock"));
        assert_eq!(data["env"], json!("/tmp/test-cortex.sock"));
    }

    #[tokio::test]
    async fn test_null_output_is_absent_result() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter("echo null", dir.path(), 10);
        assert_eq!(adapter.execute(&status_action()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_nonzero_exit_attaches_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter("echo 'E_MAP_NOT_FOUND: boom' >&2; exit 3", dir.path(), 10);

        let err = adapter.execute(&status_action()).await.unwrap_err();
        assert!(matches!(err, Error::AdapterFailed { .. }), "got {err:?}");
        assert!(err.to_string().contains("E_MAP_NOT_FOUND: boom"));
        assert_eq!(err.category(), "AdapterFailure");
    }

    #[tokio::test]
    async fn test_timeout_is_distinct_and_returns_at_deadline() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter("sleep 30", dir.path(), 1);

        let started = std::time::Instant::now();
        let err = adapter.execute(&status_action()).await.unwrap_err();
        assert!(err.is_timeout(), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_missing_interpreter_or_workdir_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();

        let mut missing = adapter("true", dir.path(), 10);
        missing.config.interpreter = "definitely-not-an-interpreter-xyz".into();
        let err = missing.execute(&status_action()).await.unwrap_err();
        assert!(matches!(err, Error::ClientUnavailable { .. }), "got {err:?}");

        let nowhere = adapter("true", &dir.path().join("absent"), 10);
        let err = nowhere.execute(&status_action()).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_invalid_action_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter("exit 1", dir.path(), 10);
        let err = adapter
            .execute(&Action::new("teleport", Default::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownMethod(_)));
    }
}
