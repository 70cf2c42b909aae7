//! In-process adapter
//!
//! Drives the crate's own [`Connection`] and translates its typed results
//! into canonical response data.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::common::Result;
use crate::protocol::types::{
    ActResult, MapSummary, NodeMatch, PageResult, PathResult, RefreshResult, RuntimeStatus,
};
use crate::protocol::Connection;
use crate::testing::suite::Action;

use super::{ClientAdapter, ClientInfo, Invocation};

/// Adapter for the built-in client
///
/// One connection is shared by every case of a run; the lock serializes
/// callers since a connection carries one request at a time.
pub struct NativeAdapter {
    info: &'static ClientInfo,
    conn: Mutex<Connection>,
}

impl NativeAdapter {
    pub fn new(info: &'static ClientInfo, socket: &Path, timeout: Duration) -> Self {
        Self {
            info,
            conn: Mutex::new(Connection::new(socket, timeout)),
        }
    }
}

#[async_trait]
impl ClientAdapter for NativeAdapter {
    fn info(&self) -> &ClientInfo {
        self.info
    }

    async fn execute(&self, action: &Action) -> Result<Option<Value>> {
        let invocation = Invocation::from_action(action)?;
        let mut conn = self.conn.lock().await;

        if let Some(handle) = invocation.map_handle() {
            conn.map(&handle).await?;
        }

        let data = match &invocation {
            Invocation::Map(p) => map_summary(&conn.map(p).await?),
            Invocation::Query(p) => node_matches(&conn.query(p).await?),
            Invocation::Pathfind(p) => match conn.pathfind(p).await? {
                Some(path) => path_result(&path),
                None => return Ok(None),
            },
            Invocation::Refresh(p) => refresh_result(&conn.refresh(p).await?),
            Invocation::Act(p) => act_result(&conn.act(p).await?),
            Invocation::Perceive(p) => page_result(&conn.perceive(p).await?),
            Invocation::Watch(p) => {
                conn.watch(p).await?;
                json!({"acknowledged": true})
            }
            Invocation::Status => runtime_status(&conn.status().await?),
        };

        Ok(Some(data))
    }
}

// === Canonical shapes ===

fn map_summary(s: &MapSummary) -> Value {
    json!({
        "node_count": s.node_count,
        "edge_count": s.edge_count,
        "domain": s.domain,
    })
}

fn node_matches(matches: &[NodeMatch]) -> Value {
    matches
        .iter()
        .map(|m| {
            json!({
                "index": m.index,
                "url": m.url,
                "page_type": m.page_type,
                "confidence": m.confidence,
                "similarity": m.similarity,
            })
        })
        .collect()
}

fn path_result(path: &PathResult) -> Value {
    let actions: Vec<Value> = path
        .required_actions
        .iter()
        .map(|a| json!({"at_node": a.at_node, "opcode": a.opcode}))
        .collect();

    json!({
        "nodes": path.nodes,
        "hops": path.hops,
        "total_weight": path.total_weight,
        "required_actions": actions,
    })
}

fn refresh_result(r: &RefreshResult) -> Value {
    json!({
        "updated_count": r.updated_count,
        "changed_nodes": r.changed_nodes,
    })
}

fn act_result(r: &ActResult) -> Value {
    json!({
        "success": r.success,
        "new_url": r.new_url,
        "features": r.features,
    })
}

fn page_result(p: &PageResult) -> Value {
    json!({
        "final_url": p.final_url,
        "page_type": p.page_type,
        "confidence": p.confidence,
        "content": p.content,
    })
}

fn runtime_status(s: &RuntimeStatus) -> Value {
    json!({
        "version": s.version,
        "uptime_seconds": s.uptime_seconds,
        "active_contexts": s.active_contexts,
        "cached_maps": s.cached_maps,
        "memory_mb": s.memory_mb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::get_client;
    use crate::common::Error;
    use crate::protocol::types::PathAction;

    #[test]
    fn test_map_summary_drops_map_path() {
        let summary = MapSummary {
            node_count: 6,
            edge_count: 14,
            domain: "localhost:8080".into(),
            map_path: Some("/tmp/x.ctx".into()),
        };
        assert_eq!(
            map_summary(&summary),
            json!({"node_count": 6, "edge_count": 14, "domain": "localhost:8080"})
        );
    }

    #[test]
    fn test_path_result_shape() {
        let path = PathResult {
            nodes: vec![0, 2, 3],
            total_weight: 2.0,
            hops: 2,
            required_actions: vec![PathAction {
                at_node: 3,
                opcode: [4, 0],
            }],
        };
        assert_eq!(
            path_result(&path),
            json!({
                "nodes": [0, 2, 3],
                "hops": 2,
                "total_weight": 2.0,
                "required_actions": [{"at_node": 3, "opcode": [4, 0]}]
            })
        );
    }

    #[test]
    fn test_node_matches_keep_null_similarity() {
        let matches = vec![NodeMatch {
            index: 2,
            url: "http://localhost:1/products".into(),
            page_type: 4,
            confidence: 0.9,
            features: Default::default(),
            similarity: None,
        }];
        let value = node_matches(&matches);
        assert_eq!(value[0]["similarity"], Value::Null);
        assert_eq!(value[0]["page_type"], json!(4));
        assert!(value[0].get("features").is_none());
    }

    #[tokio::test]
    async fn test_unreachable_runtime_is_connection_failure() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = NativeAdapter::new(
            get_client("native").unwrap(),
            &dir.path().join("cortex.sock"),
            Duration::from_secs(1),
        );
        let action = Action::new("status", Default::default());

        let err = adapter.execute(&action).await.unwrap_err();
        assert!(matches!(err, Error::SocketNotFound(_)), "got {err:?}");
    }
}
