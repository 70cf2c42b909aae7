//! Cortex conformance harness
//!
//! This library holds the Cortex wire protocol and native client, the
//! fixture site, the declarative assertion language, client adapters and
//! the suite executor.

pub mod adapter;
pub mod assertion;
pub mod cli;
pub mod commands;
pub mod common;
pub mod fixture;
pub mod protocol;
pub mod testing;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use protocol::{Connection, Method, Response};
