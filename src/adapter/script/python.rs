//! Python client driver
//!
//! Drives the `cortex_client` package. The package's results already use
//! the canonical snake_case names, so the driver only picks fields.

use std::ffi::OsString;
use std::path::Path;

use crate::adapter::Invocation;
use crate::common::Result;

use super::{args_literal, Driver};

const PRELUDE: &str = r#"import json
import os
import sys

import cortex_client

SOCKET = sys.argv[1] if len(sys.argv) > 1 else os.environ.get("CORTEX_SOCKET", "/tmp/cortex.sock")
"#;

const MAP_HANDLE: &str = r#"sm = cortex_client.map(P["domain"], max_render=5, socket_path=SOCKET)
"#;

const MAP: &str = r#"sm = cortex_client.map(
    P["domain"],
    max_nodes=P["max_nodes"],
    max_render=P["max_render"],
    max_time_ms=P["max_time_ms"],
    respect_robots=P["respect_robots"],
    socket_path=SOCKET,
)
out = {"node_count": sm.node_count, "edge_count": sm.edge_count, "domain": sm.domain}
"#;

const QUERY: &str = r#"if P.get("mode") == "nearest":
    matches = sm.nearest(P.get("goal_vector", []), k=P["limit"])
else:
    sort_by = P.get("sort_by")
    matches = sm.filter(
        page_type=P.get("page_type"),
        features=P.get("features"),
        flags=P.get("flags"),
        sort_by=(sort_by["dimension"], sort_by["direction"]) if sort_by else None,
        limit=P["limit"],
    )
out = [
    {
        "index": m.index,
        "url": m.url,
        "page_type": m.page_type,
        "confidence": m.confidence,
        "similarity": m.similarity,
    }
    for m in matches
]
"#;

const PATHFIND: &str = r#"path = sm.pathfind(P["from"], P["to"], avoid_flags=P.get("avoid_flags"), minimize=P["minimize"])
if path is None:
    out = None
else:
    out = {
        "nodes": list(path.nodes),
        "hops": path.hops,
        "total_weight": path.total_weight,
        "required_actions": [
            {"at_node": a.at_node, "opcode": list(a.opcode)} for a in path.required_actions
        ],
    }
"#;

const REFRESH: &str = r#"r = sm.refresh(nodes=P.get("nodes"), cluster=P.get("cluster"), stale_threshold=P.get("stale_threshold"))
out = {"updated_count": r.updated_count, "changed_nodes": list(r.changed_nodes)}
"#;

const ACT: &str = r#"r = sm.act(P["node"], tuple(P["opcode"]), params=P.get("params"), session_id=P.get("session_id"))
out = {"success": r.success, "new_url": r.new_url, "features": r.features}
"#;

const PERCEIVE: &str = r#"page = cortex_client.perceive(P["url"], include_content=P["include_content"], socket_path=SOCKET)
out = {
    "final_url": page.final_url,
    "page_type": page.page_type,
    "confidence": page.confidence,
    "content": page.content,
}
"#;

const WATCH: &str = r#"sm.watch(nodes=P.get("nodes"), cluster=P.get("cluster"), features=P.get("features"), interval_ms=P["interval_ms"])
out = {"acknowledged": True}
"#;

const STATUS: &str = r#"s = cortex_client.status(socket_path=SOCKET)
out = {
    "version": s.version,
    "uptime_seconds": s.uptime_seconds,
    "active_contexts": s.active_contexts,
    "cached_maps": s.cached_maps,
    "memory_mb": s.memory_mb,
}
"#;

const EMIT: &str = "print(json.dumps(out))\n";

/// Driver for the Python client (`python3 -c`)
pub struct PythonDriver;

impl Driver for PythonDriver {
    fn eval_flag(&self) -> &'static str {
        "-c"
    }

    fn program(&self, invocation: &Invocation) -> Result<String> {
        let body = match invocation {
            Invocation::Map(_) => MAP,
            Invocation::Query(_) => QUERY,
            Invocation::Pathfind(_) => PATHFIND,
            Invocation::Refresh(_) => REFRESH,
            Invocation::Act(_) => ACT,
            Invocation::Perceive(_) => PERCEIVE,
            Invocation::Watch(_) => WATCH,
            Invocation::Status => STATUS,
        };

        let mut program = String::from(PRELUDE);
        program.push_str(&format!("P = json.loads({})\n", args_literal(invocation)?));
        if invocation.map_handle().is_some() {
            program.push_str(MAP_HANDLE);
        }
        program.push_str(body);
        program.push_str(EMIT);
        Ok(program)
    }

    /// Import the package from the client directory without installing it
    fn env(&self, workdir: &Path) -> Vec<(&'static str, OsString)> {
        vec![("PYTHONPATH", workdir.as_os_str().to_owned())]
    }
}
