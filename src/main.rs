//! Cortex conformance harness
//!
//! Runs declarative suites against every Cortex client implementation and
//! checks that they observe the same results from the same runtime.

use std::path::PathBuf;

use clap::Parser;
use conformance::common::{config::Config, logging};
use conformance::{cli, commands::Commands};

#[derive(Parser)]
#[command(name = "conformance", about = "Cortex client conformance harness")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::init_cli(cli.verbose);

    let result = match Config::load(cli.config.as_deref()) {
        Ok(config) => cli::dispatch(cli.command, &config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
