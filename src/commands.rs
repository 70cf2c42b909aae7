//! CLI command definitions
//!
//! Defines the clap commands for the conformance harness.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run conformance suites against one or more clients
    Run(RunArgs),

    /// Serve the fixture site until interrupted
    Serve {
        /// Port to bind (0 = chosen by the OS)
        #[arg(long, default_value = "0")]
        port: u16,
    },

    /// List available suites
    Suites {
        /// Directory containing test_<name>.json files
        #[arg(long)]
        suites_dir: Option<PathBuf>,
    },

    /// Show runtime status
    Status {
        /// Path to the runtime socket
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Clients to run: native, python, typescript, both, all (or a comma list)
    #[arg(long, default_value = "all")]
    pub client: String,

    /// Suites to run: a name, a comma list, or all
    #[arg(long, default_value = "all")]
    pub suite: String,

    /// Fixture site port (0 = chosen by the OS)
    #[arg(long, default_value = "0")]
    pub port: u16,

    /// Path to the runtime socket
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Directory containing test_<name>.json files
    #[arg(long)]
    pub suites_dir: Option<PathBuf>,

    /// Fail when clients disagree on any asserted field
    #[arg(long)]
    pub parity: bool,
}
