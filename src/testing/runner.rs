//! Suite executor
//!
//! Runs every case of a suite, in order, through one client adapter and
//! collects one result per case. Adapter failures and assertion failures
//! become failed results; nothing short of a panic stops a suite early.

use serde_json::Value;

use crate::adapter::ClientAdapter;
use crate::assertion::{evaluate, extract_field};
use crate::common::Error;

use super::suite::{Suite, TestCase};

/// Value an assertion's field resolved to in one client's response
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub field: String,
    /// `Null` when the field was absent
    pub value: Value,
}

/// Result of a single test case
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult {
    pub case_id: String,
    pub passed: bool,
    /// Failure diagnostic, empty on success
    pub message: String,
    /// Parity-relevant field values; `None` when the client produced no data
    pub observations: Option<Vec<Observation>>,
}

impl TestResult {
    fn failed(case_id: &str, message: String) -> Self {
        Self {
            case_id: case_id.to_string(),
            passed: false,
            message,
            observations: None,
        }
    }
}

/// Results of one suite run against one client
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteResult {
    pub suite: String,
    pub client: String,
    /// In case-load order
    pub results: Vec<TestResult>,
}

impl SuiteResult {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}

/// Run every case of a suite through an adapter
///
/// Each pairing works on its own port-substituted copy of the cases.
pub async fn run_suite(suite: &Suite, adapter: &dyn ClientAdapter, port: u16) -> SuiteResult {
    let client = adapter.info().id;
    let suite = suite.with_port(port);

    tracing::info!(suite = %suite.suite, client, cases = suite.cases.len(), "Running suite");

    let mut results = Vec::with_capacity(suite.cases.len());
    for case in &suite.cases {
        let result = run_case(case, adapter).await;
        tracing::debug!(
            suite = %suite.suite,
            client,
            case = %result.case_id,
            passed = result.passed,
            "Case finished"
        );
        results.push(result);
    }

    SuiteResult {
        suite: suite.suite.clone(),
        client: client.to_string(),
        results,
    }
}

/// Run one case through an adapter and check its assertions
pub async fn run_case(case: &TestCase, adapter: &dyn ClientAdapter) -> TestResult {
    match adapter.execute(&case.action).await {
        Ok(data) => check_case(case, data.as_ref()),
        Err(e) => TestResult::failed(&case.id, format!("{}: {}", e.category(), e)),
    }
}

/// Evaluate a case's assertions against response data
///
/// Assertions are checked in order and the first failure decides the
/// message. Every field is still extracted so results can be compared
/// across clients.
pub fn check_case(case: &TestCase, data: Option<&Value>) -> TestResult {
    let mut failure: Option<Error> = None;
    let mut observations = Vec::new();

    for assertion in &case.assertions {
        let actual = extract_field(data, &assertion.field);

        if failure.is_none() {
            let verdict = evaluate(actual.as_ref(), assertion);
            if !verdict.passed {
                failure = Some(Error::Assertion {
                    field: assertion.field.clone(),
                    detail: verdict.message,
                });
            }
        }

        if assertion.parity {
            observations.push(Observation {
                field: assertion.field.clone(),
                value: actual.unwrap_or(Value::Null),
            });
        }
    }

    TestResult {
        case_id: case.id.clone(),
        passed: failure.is_none(),
        message: failure.map(|e| e.to_string()).unwrap_or_default(),
        observations: Some(observations),
    }
}
