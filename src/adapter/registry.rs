//! Client registry
//!
//! Lists the clients the harness can drive and resolves a client selection
//! (`native`, `python`, `typescript`, `both`, `all`) into concrete adapters.

use std::path::Path;
use std::sync::Arc;

use crate::common::config::Config;
use crate::common::{Error, Result};

use super::native::NativeAdapter;
use super::script::{python::PythonDriver, typescript::TypeScriptDriver, ScriptAdapter};
use super::ClientAdapter;

/// Where a client runs relative to the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Linked into the harness process
    InProcess,
    /// Driven through a generated program in another runtime
    OutOfProcess,
}

/// Information about a client
#[derive(Debug, Clone)]
pub struct ClientInfo {
    /// Identifier used on the command line and in reports
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    pub kind: ClientKind,
    /// Brief description
    pub description: &'static str,
}

/// All known clients, in report order
static CLIENTS: &[ClientInfo] = &[
    ClientInfo {
        id: "native",
        name: "Rust",
        kind: ClientKind::InProcess,
        description: "Built-in protocol client",
    },
    ClientInfo {
        id: "python",
        name: "Python",
        kind: ClientKind::OutOfProcess,
        description: "cortex_client package driven through python3",
    },
    ClientInfo {
        id: "typescript",
        name: "TypeScript",
        kind: ClientKind::OutOfProcess,
        description: "Compiled TypeScript client driven through node",
    },
];

/// Get all registered clients
pub fn all_clients() -> &'static [ClientInfo] {
    CLIENTS
}

/// Get client info by ID
pub fn get_client(id: &str) -> Option<&'static ClientInfo> {
    CLIENTS.iter().find(|c| c.id == id)
}

/// Resolve a selection into client IDs
///
/// Accepts a single ID, `both` (the two out-of-process clients), `all`, or a
/// comma-separated list of any of these. Duplicates are dropped and the
/// registry order is kept.
pub fn parse_selection(selection: &str) -> Result<Vec<&'static str>> {
    let mut wanted: Vec<&'static str> = Vec::new();

    for token in selection.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let ids: Vec<&'static str> = match token {
            "all" => CLIENTS.iter().map(|c| c.id).collect(),
            "both" => CLIENTS
                .iter()
                .filter(|c| c.kind == ClientKind::OutOfProcess)
                .map(|c| c.id)
                .collect(),
            id => vec![
                get_client(id)
                    .ok_or_else(|| Error::UnknownClient(id.to_string()))?
                    .id,
            ],
        };
        for id in ids {
            if !wanted.contains(&id) {
                wanted.push(id);
            }
        }
    }

    if wanted.is_empty() {
        return Err(Error::UnknownClient(selection.to_string()));
    }

    wanted.sort_by_key(|id| CLIENTS.iter().position(|c| c.id == *id));
    Ok(wanted)
}

/// Build the adapter for a client
pub fn get_adapter(id: &str, config: &Config, socket: &Path) -> Option<Arc<dyn ClientAdapter>> {
    let info = get_client(id)?;
    let timeout = config.runtime.request_timeout();

    match id {
        "native" => Some(Arc::new(NativeAdapter::new(info, socket, timeout))),
        "python" => Some(Arc::new(ScriptAdapter::new(
            info,
            config.script_client(id)?,
            socket,
            PythonDriver,
        ))),
        "typescript" => Some(Arc::new(ScriptAdapter::new(
            info,
            config.script_client(id)?,
            socket,
            TypeScriptDriver,
        ))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_client() {
        assert_eq!(get_client("native").unwrap().kind, ClientKind::InProcess);
        assert!(get_client("ruby").is_none());
    }

    #[test]
    fn test_selection_groups() {
        assert_eq!(parse_selection("both").unwrap(), vec!["python", "typescript"]);
        assert_eq!(
            parse_selection("all").unwrap(),
            vec!["native", "python", "typescript"]
        );
        assert_eq!(parse_selection("python").unwrap(), vec!["python"]);
        assert_eq!(
            parse_selection("typescript, native,typescript").unwrap(),
            vec!["native", "typescript"]
        );
    }

    #[test]
    fn test_unknown_selection() {
        assert!(matches!(
            parse_selection("ruby"),
            Err(Error::UnknownClient(ref id)) if id == "ruby"
        ));
        assert!(parse_selection(" , ").is_err());
    }

    #[test]
    fn test_every_client_has_an_adapter() {
        let config = Config::default();
        for client in all_clients() {
            let adapter = get_adapter(client.id, &config, Path::new("/tmp/cortex.sock"))
                .unwrap_or_else(|| panic!("no adapter for {}", client.id));
            assert_eq!(adapter.info().id, client.id);
        }
    }
}
