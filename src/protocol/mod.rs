//! Cortex wire protocol
//!
//! Newline-delimited JSON request/response over a local socket. This module
//! holds the envelope shared by every client, the typed params and results,
//! the frame transport, and the native client built on them.

pub mod client;
pub mod envelope;
pub mod transport;
pub mod types;

pub use client::Connection;
pub use envelope::{ErrorBody, Method, Outcome, Request, Response, E_NO_PATH};
