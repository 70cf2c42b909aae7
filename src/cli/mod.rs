//! CLI command handling
//!
//! Dispatches CLI commands and formats their output. Every command returns
//! whether it succeeded so `main` can set the exit status.

mod preflight;
pub mod run;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::Result;
use crate::fixture::{corpus, FixtureSite};
use crate::protocol::Connection;
use crate::testing::{discover_suites, load_suite};

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config: &Config) -> Result<bool> {
    match command {
        Commands::Run(args) => run::run(config, args).await,

        Commands::Serve { port } => {
            let site = FixtureSite::start(config.harness.fixture_host, port).await?;

            println!("Serving fixture site at {}", site.base_url());
            println!("Domain for map requests: {}", site.domain());
            for page in corpus::all_pages() {
                println!("  {:<18} {}", page.path, page.content_type().dimmed());
            }
            println!("Press Ctrl-C to stop.");

            tokio::signal::ctrl_c().await?;
            site.shutdown().await;
            Ok(true)
        }

        Commands::Suites { suites_dir } => {
            let dir = suites_dir.unwrap_or_else(|| config.harness.suites_dir.clone());
            let found = discover_suites(&dir)?;

            if found.is_empty() {
                println!("No suites found in {}", dir.display());
                return Ok(true);
            }

            println!("Suites in {}:", dir.display());
            for (name, path) in &found {
                match load_suite(path) {
                    Ok(suite) => {
                        let description = suite.description.as_deref().unwrap_or("");
                        println!(
                            "  {:<12} {:>3} case(s)  {}",
                            name.bold(),
                            suite.cases.len(),
                            description.dimmed()
                        );
                    }
                    Err(e) => println!("  {:<12} {}", name.bold(), e.to_string().red()),
                }
            }
            Ok(true)
        }

        Commands::Status { socket } => {
            let socket = socket.unwrap_or_else(|| config.runtime.socket_path.clone());
            let mut conn = Connection::new(&socket, config.runtime.request_timeout());

            let status = match conn.status().await {
                Ok(status) => status,
                Err(e) if e.is_connection_failure() => {
                    println!("{} {}", "Cortex is not reachable:".red(), e);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            };

            println!("Cortex {}", status.version.bold());
            println!("  Socket:          {}", socket.display());
            println!("  Uptime:          {:.1}s", status.uptime_seconds);
            println!("  Active contexts: {}", status.active_contexts);
            println!("  Cached maps:     {}", status.cached_maps);
            println!("  Memory:          {:.1} MB", status.memory_mb);
            Ok(true)
        }
    }
}
