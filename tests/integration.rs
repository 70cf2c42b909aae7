//! End-to-end tests for the conformance harness
//!
//! These tests start the mock runtime on a private socket, then drive the
//! shipped suites through native connections, both through the library and
//! through the `conformance` binary, and compare clients for parity.

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use conformance::adapter::{get_adapter, ClientAdapter, ClientInfo, ClientKind};
use conformance::common::config::Config;
use conformance::fixture::FixtureSite;
use conformance::testing::{
    check_parity, discover_suites, load_suite, run_suite, Action, Suite, SuiteResult,
};
use serde_json::{json, Value};

/// A mock runtime listening on a socket in its own temp directory
struct TestContext {
    temp_dir: tempfile::TempDir,
    socket: PathBuf,
    runtime: Child,
}

impl TestContext {
    fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let socket = temp_dir.path().join("cortex.sock");

        let runtime = Command::new(env!("CARGO_BIN_EXE_mock-runtime"))
            .arg("--socket")
            .arg(&socket)
            .arg("--log-dir")
            .arg(temp_dir.path())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("Failed to start mock runtime");

        let deadline = Instant::now() + Duration::from_secs(10);
        while !socket.exists() {
            assert!(Instant::now() < deadline, "mock runtime never created its socket");
            std::thread::sleep(Duration::from_millis(50));
        }

        Self {
            temp_dir,
            socket,
            runtime,
        }
    }

    fn config(&self) -> Config {
        let mut config = Config::default();
        config.runtime.socket_path = self.socket.clone();
        config.runtime.request_timeout_secs = 30;
        config
    }

    fn native(&self) -> Arc<dyn ClientAdapter> {
        get_adapter("native", &self.config(), &self.socket).expect("native adapter")
    }

    /// Write a suite file into a fresh directory under the temp dir
    fn suites_dir_with(&self, name: &str, body: &str) -> PathBuf {
        let dir = self.temp_dir.path().join(format!("suites-{}", name));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("test_{}.json", name)), body).unwrap();
        dir
    }

    /// Run the harness binary with an isolated configuration directory
    fn run_harness(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_conformance"))
            .args(args)
            .env("XDG_CONFIG_HOME", self.temp_dir.path().join("config"))
            .env("HOME", self.temp_dir.path())
            .env("NO_COLOR", "1")
            .output()
            .expect("Failed to run conformance")
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        let _ = self.runtime.kill();
        let _ = self.runtime.wait();
    }
}

fn shipped_suites() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("suites")
}

fn action(method: &str, args: Value) -> Action {
    match args {
        Value::Object(args) => Action::new(method, args),
        other => panic!("action args must be an object, got {}", other),
    }
}

/// A second client: its own connection to the runtime, optionally rewriting map results
struct SecondClient {
    info: ClientInfo,
    inner: Arc<dyn ClientAdapter>,
    extra_nodes: u64,
}

impl SecondClient {
    fn new(inner: Arc<dyn ClientAdapter>, extra_nodes: u64) -> Self {
        Self {
            info: ClientInfo {
                id: "second",
                name: "Second native connection",
                kind: ClientKind::InProcess,
                description: "Independent connection to the same runtime",
            },
            inner,
            extra_nodes,
        }
    }
}

#[async_trait]
impl ClientAdapter for SecondClient {
    fn info(&self) -> &ClientInfo {
        &self.info
    }

    async fn execute(&self, action: &Action) -> conformance::Result<Option<Value>> {
        let mut data = self.inner.execute(action).await?;
        if let Some(count) = data.as_mut().and_then(|d| d.get_mut("node_count")) {
            if let Some(n) = count.as_u64() {
                *count = json!(n + self.extra_nodes);
            }
        }
        Ok(data)
    }
}

fn load_shipped() -> Vec<Suite> {
    discover_suites(&shipped_suites())
        .unwrap()
        .iter()
        .map(|(_, path)| load_suite(path).unwrap())
        .collect()
}

/// Run every suite through every adapter, suite-major like the harness driver
async fn run_all(
    suites: &[Suite],
    adapters: &[Arc<dyn ClientAdapter>],
    port: u16,
) -> Vec<SuiteResult> {
    let mut results = Vec::new();
    for suite in suites {
        for adapter in adapters {
            results.push(run_suite(suite, adapter.as_ref(), port).await);
        }
    }
    results
}

fn loopback() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

#[tokio::test]
async fn test_shipped_suites_pass_with_native_client() {
    let ctx = TestContext::new();
    let adapter = ctx.native();
    let site = FixtureSite::start(loopback(), 0).await.unwrap();

    let found = discover_suites(&shipped_suites()).unwrap();
    assert!(!found.is_empty());

    let mut results = Vec::new();
    for (name, path) in &found {
        let suite = load_suite(path).unwrap();
        let result = run_suite(&suite, adapter.as_ref(), site.port()).await;
        for case in &result.results {
            assert!(
                case.passed,
                "{}/{} failed: {}",
                name,
                case.case_id,
                case.message
            );
        }
        results.push(result);
    }

    // One client has nothing to diverge from
    assert!(check_parity(&results).is_empty());

    site.shutdown().await;
}

#[tokio::test]
async fn test_native_canonical_shapes() {
    let ctx = TestContext::new();
    let adapter = ctx.native();
    let site = FixtureSite::start(loopback(), 0).await.unwrap();
    let domain = site.domain();

    let map = adapter
        .execute(&action("map", json!({"domain": domain})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(map["node_count"], 6);
    assert_eq!(map["edge_count"], 10);
    assert_eq!(map["domain"], domain.as_str());

    let route = adapter
        .execute(&action(
            "pathfind",
            json!({"domain": domain, "from_node": 0, "to_node": 5}),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(route["nodes"], json!([0, 5]));
    assert_eq!(route["hops"], 1);
    assert_eq!(route["required_actions"][0]["at_node"], 5);

    let blocked = adapter
        .execute(&action(
            "pathfind",
            json!({
                "domain": domain,
                "from_node": 0,
                "to_node": 5,
                "avoid_flags": ["has_form"]
            }),
        ))
        .await
        .unwrap();
    assert!(blocked.is_none());

    let page = adapter
        .execute(&action(
            "perceive",
            json!({"url": format!("http://localhost:{}/products/widget", site.port())}),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page["page_type"], 5);
    assert!(page["content"].as_str().unwrap().contains("29.99"));

    let watch = adapter
        .execute(&action("watch", json!({"domain": domain})))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(watch, json!({"acknowledged": true}));

    let status = adapter
        .execute(&action("status", json!({})))
        .await
        .unwrap()
        .unwrap();
    assert!(status["cached_maps"].as_u64().unwrap() >= 1);

    site.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_page_is_resource_not_found() {
    let ctx = TestContext::new();
    let adapter = ctx.native();
    let site = FixtureSite::start(loopback(), 0).await.unwrap();

    let err = adapter
        .execute(&action(
            "perceive",
            json!({"url": format!("http://localhost:{}/missing", site.port())}),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.category(), "ResourceNotFound");

    site.shutdown().await;
}

#[test]
fn test_cli_run_succeeds() {
    let ctx = TestContext::new();
    let socket = ctx.socket.to_str().unwrap();
    let suites = shipped_suites();

    let output = ctx.run_harness(&[
        "run",
        "--client",
        "native",
        "--suite",
        "all",
        "--socket",
        socket,
        "--suites-dir",
        suites.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stdout:\n{}", stdout);
    assert!(stdout.contains("--- map / native ---"));
    assert!(stdout.contains("PASS: map_basic"));
    assert!(stdout.contains(" 0 failed"));
}

#[test]
fn test_cli_failing_assertion_exits_nonzero() {
    let ctx = TestContext::new();
    let suites = ctx.suites_dir_with(
        "impossible",
        r#"{
            "suite": "impossible",
            "cases": [{
                "id": "too_many_nodes",
                "action": {"method": "map", "args": {"domain": "localhost:{{PORT}}"}},
                "assertions": [{"field": "node_count", "op": "gte", "value": 1000}]
            }]
        }"#,
    );

    let output = ctx.run_harness(&[
        "run",
        "--client",
        "native",
        "--socket",
        ctx.socket.to_str().unwrap(),
        "--suites-dir",
        suites.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1), "stdout:\n{}", stdout);
    assert!(stdout.contains("FAIL: too_many_nodes (Assertion failed on node_count"));
    assert!(stdout.contains("1 failed"));
}

#[test]
fn test_cli_missing_runtime_reports_connection_failure() {
    let ctx = TestContext::new();
    let absent = ctx.temp_dir.path().join("absent.sock");
    let suites = shipped_suites();

    let output = ctx.run_harness(&[
        "run",
        "--client",
        "native",
        "--suite",
        "status",
        "--socket",
        absent.to_str().unwrap(),
        "--suites-dir",
        suites.to_str().unwrap(),
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout.contains("FAIL: status_basic (ConnectionFailure"), "stdout:\n{}", stdout);
}

#[test]
fn test_cli_unknown_client_is_rejected() {
    let ctx = TestContext::new();
    let output = ctx.run_harness(&["run", "--client", "rust", "--socket", ctx.socket.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown client 'rust'"));
}

#[test]
fn test_cli_status_against_mock_runtime() {
    let ctx = TestContext::new();
    let output = ctx.run_harness(&["status", "--socket", ctx.socket.to_str().unwrap()]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stdout:\n{}", stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains("Cached maps:"));
}

#[tokio::test]
async fn test_two_clients_agree_on_every_field() {
    let ctx = TestContext::new();
    let site = FixtureSite::start(loopback(), 0).await.unwrap();
    let adapters: Vec<Arc<dyn ClientAdapter>> = vec![
        ctx.native(),
        Arc::new(SecondClient::new(ctx.native(), 0)),
    ];

    let results = run_all(&load_shipped(), &adapters, site.port()).await;

    for result in &results {
        assert!(
            result.all_passed(),
            "{} / {} had failures: {:?}",
            result.suite,
            result.client,
            result.results
        );
    }
    assert!(results.iter().any(|r| r.client == "second"));

    let divergences = check_parity(&results);
    assert!(divergences.is_empty(), "unexpected divergences: {:?}", divergences);

    site.shutdown().await;
}

#[tokio::test]
async fn test_disagreeing_client_is_reported() {
    let ctx = TestContext::new();
    let site = FixtureSite::start(loopback(), 0).await.unwrap();
    let adapters: Vec<Arc<dyn ClientAdapter>> = vec![
        ctx.native(),
        Arc::new(SecondClient::new(ctx.native(), 1)),
    ];

    let map_suite: Vec<Suite> = load_shipped()
        .into_iter()
        .filter(|s| s.suite == "map")
        .collect();
    let results = run_all(&map_suite, &adapters, site.port()).await;

    // Both still satisfy node_count >= 6; only parity catches the difference
    assert!(results.iter().all(SuiteResult::all_passed));

    let divergences = check_parity(&results);
    assert!(!divergences.is_empty());
    for divergence in &divergences {
        assert_eq!(divergence.suite, "map");
        assert_eq!(divergence.field, "node_count");
        assert_eq!(divergence.baseline, ("native".to_string(), json!(6)));
        assert_eq!(divergence.other, ("second".to_string(), json!(7)));
    }

    site.shutdown().await;
}

#[test]
fn test_cli_parity_run_succeeds() {
    let ctx = TestContext::new();
    let suites = shipped_suites();

    let output = ctx.run_harness(&[
        "run",
        "--client",
        "native",
        "--socket",
        ctx.socket.to_str().unwrap(),
        "--suites-dir",
        suites.to_str().unwrap(),
        "--parity",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stdout:\n{}", stdout);
    assert!(stdout.contains("Parity: all clients agree"));
}
