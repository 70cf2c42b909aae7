//! The `run` command
//!
//! Starts the fixture site, runs every selected suite through every selected
//! client, prints the report and decides the exit status.

use std::path::Path;
use std::sync::Arc;

use crate::adapter::{get_adapter, parse_selection, ClientAdapter};
use crate::commands::RunArgs;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::fixture::FixtureSite;
use crate::testing::report::{self, Totals};
use crate::testing::{check_parity, discover_suites, load_suite, resolve_suite, run_suite, Suite};

use super::preflight;

/// Run the selected suites; returns whether the run succeeded
///
/// Only fixture failures abort the run. Per-case failures are reported and
/// counted.
pub async fn run(config: &Config, args: RunArgs) -> Result<bool> {
    let socket = args
        .socket
        .clone()
        .unwrap_or_else(|| config.runtime.socket_path.clone());
    let suites_dir = args
        .suites_dir
        .clone()
        .unwrap_or_else(|| config.harness.suites_dir.clone());

    let clients = parse_selection(&args.client)?;
    let suites = select_suites(&suites_dir, &args.suite)?;
    let adapters = clients
        .iter()
        .map(|id| get_adapter(id, config, &socket).ok_or_else(|| Error::UnknownClient(id.to_string())))
        .collect::<Result<Vec<Arc<dyn ClientAdapter>>>>()?;

    let site = FixtureSite::start(config.harness.fixture_host, args.port).await?;
    if let Err(e) = preflight::check_fixture(&site).await {
        site.shutdown().await;
        return Err(e);
    }
    preflight::probe_runtime(&socket).await;

    println!("Fixture site: {}", site.base_url());
    println!("Runtime socket: {}", socket.display());

    let mut results = Vec::with_capacity(suites.len() * adapters.len());
    for suite in &suites {
        for adapter in &adapters {
            let result = run_suite(suite, adapter.as_ref(), site.port()).await;
            report::print_suite_result(&result);
            results.push(result);
        }
    }

    site.shutdown().await;

    let totals = Totals::from_results(&results);
    let mut success = totals.success();

    if args.parity {
        let divergences = check_parity(&results);
        report::print_divergences(&divergences);
        success &= divergences.is_empty();
    }

    report::print_totals(&totals);
    Ok(success)
}

/// Load the suites named by a selection (`all` or a comma list)
pub fn select_suites(dir: &Path, selection: &str) -> Result<Vec<Suite>> {
    let paths = if selection.trim() == "all" {
        let found = discover_suites(dir)?;
        if found.is_empty() {
            return Err(Error::Config(format!(
                "no suites found in {}",
                dir.display()
            )));
        }
        found.into_iter().map(|(_, path)| path).collect()
    } else {
        selection
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| resolve_suite(dir, name))
            .collect::<Result<Vec<_>>>()?
    };

    if paths.is_empty() {
        return Err(Error::Config(format!("no suites selected by '{}'", selection)));
    }

    paths.iter().map(|path| load_suite(path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_suite(dir: &Path, name: &str) {
        std::fs::write(
            dir.join(format!("test_{}.json", name)),
            format!(r#"{{"suite": "{}", "cases": []}}"#, name),
        )
        .unwrap();
    }

    #[test]
    fn test_select_all_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(dir.path(), "query");
        write_suite(dir.path(), "map");

        let names: Vec<String> = select_suites(dir.path(), "all")
            .unwrap()
            .into_iter()
            .map(|s| s.suite)
            .collect();
        assert_eq!(names, vec!["map", "query"]);
    }

    #[test]
    fn test_select_named_keeps_given_order() {
        let dir = tempfile::tempdir().unwrap();
        write_suite(dir.path(), "query");
        write_suite(dir.path(), "map");

        let names: Vec<String> = select_suites(dir.path(), "query,map")
            .unwrap()
            .into_iter()
            .map(|s| s.suite)
            .collect();
        assert_eq!(names, vec!["query", "map"]);

        assert!(matches!(
            select_suites(dir.path(), "pathfind"),
            Err(Error::SuiteNotFound { .. })
        ));
    }

    #[test]
    fn test_empty_directory_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = select_suites(dir.path(), "all").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
