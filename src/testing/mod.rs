//! Conformance suites
//!
//! Loads declarative suites, runs them through client adapters, compares
//! clients with each other and prints the report.

pub mod parity;
pub mod report;
pub mod runner;
pub mod suite;

pub use parity::{check_parity, Divergence};
pub use runner::{run_case, run_suite, Observation, SuiteResult, TestResult};
pub use suite::{discover_suites, load_suite, resolve_suite, Action, Suite, TestCase};
