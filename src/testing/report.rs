//! Human-readable report
//!
//! Printed to stdout; logs go to stderr so the report can be captured alone.

use colored::Colorize;

use super::parity::Divergence;
use super::runner::SuiteResult;

/// Aggregate counts over a whole run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub passed: usize,
    pub failed: usize,
}

impl Totals {
    pub fn from_results(results: &[SuiteResult]) -> Self {
        results.iter().fold(Totals::default(), |acc, r| Totals {
            passed: acc.passed + r.passed(),
            failed: acc.failed + r.failed(),
        })
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Print one suite/client block
pub fn print_suite_result(result: &SuiteResult) {
    println!(
        "\n{}",
        format!("--- {} / {} ---", result.suite, result.client).bold()
    );

    for case in &result.results {
        if case.passed {
            println!("  {}: {}", "PASS".green(), case.case_id);
        } else {
            println!("  {}: {} ({})", "FAIL".red(), case.case_id, case.message);
        }
    }
}

/// Print cross-client divergences
pub fn print_divergences(divergences: &[Divergence]) {
    if divergences.is_empty() {
        println!("\n{} all clients agree", "Parity:".bold());
        return;
    }

    println!(
        "\n{} {} divergence(s)",
        "Parity:".bold(),
        divergences.len().to_string().red()
    );
    for divergence in divergences {
        println!("  {}: {}", "DIVERGE".red(), divergence);
    }
}

/// Print the closing rule and totals
pub fn print_totals(totals: &Totals) {
    println!("\n{}", "=".repeat(40));
    let line = format!("Total: {} passed, {} failed", totals.passed, totals.failed);
    if totals.success() {
        println!("{}", line.green().bold());
    } else {
        println!("{}", line.red().bold());
    }
}
