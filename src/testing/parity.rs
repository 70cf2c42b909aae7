//! Cross-client parity
//!
//! The same case run through different clients against the same runtime
//! must resolve every assertion field to the same value. Results are
//! compared against the first client that ran each suite.

use std::fmt;

use serde_json::Value;

use crate::assertion::values_equal;

use super::runner::{SuiteResult, TestResult};

/// One field on which two clients disagree
#[derive(Debug, Clone, PartialEq)]
pub struct Divergence {
    pub suite: String,
    pub case_id: String,
    pub field: String,
    pub baseline: (String, Value),
    pub other: (String, Value),
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} {}: {} = {}, {} = {}",
            self.suite,
            self.case_id,
            self.field,
            self.baseline.0,
            self.baseline.1,
            self.other.0,
            self.other.1
        )
    }
}

/// Compare observations across every client that ran the same suite
///
/// Cases where either client produced no data are skipped.
pub fn check_parity(results: &[SuiteResult]) -> Vec<Divergence> {
    let mut divergences = Vec::new();

    for (i, baseline) in results.iter().enumerate() {
        // Only the first result of each suite acts as baseline
        if results[..i].iter().any(|r| r.suite == baseline.suite) {
            continue;
        }

        for other in results[i + 1..].iter().filter(|r| r.suite == baseline.suite) {
            for base_case in &baseline.results {
                let Some(other_case) = other.results.iter().find(|r| r.case_id == base_case.case_id)
                else {
                    continue;
                };
                compare_case(baseline, base_case, other, other_case, &mut divergences);
            }
        }
    }

    divergences
}

fn compare_case(
    baseline: &SuiteResult,
    base_case: &TestResult,
    other: &SuiteResult,
    other_case: &TestResult,
    out: &mut Vec<Divergence>,
) {
    let (Some(base_obs), Some(other_obs)) = (&base_case.observations, &other_case.observations)
    else {
        return;
    };

    for (b, o) in base_obs.iter().zip(other_obs) {
        if b.field == o.field && !values_equal(&b.value, &o.value) {
            out.push(Divergence {
                suite: baseline.suite.clone(),
                case_id: base_case.case_id.clone(),
                field: b.field.clone(),
                baseline: (baseline.client.clone(), b.value.clone()),
                other: (other.client.clone(), o.value.clone()),
            });
        }
    }
}
