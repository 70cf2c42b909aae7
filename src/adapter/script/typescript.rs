//! TypeScript client driver
//!
//! Requires the compiled client from `./dist/index` inside the client
//! directory and translates its camelCase results to canonical names.

use crate::adapter::Invocation;
use crate::common::Result;

use super::{args_literal, Driver};

const PRELUDE: &str = r#"const client = require('./dist/index');
const SOCKET = process.argv[1] || process.env.CORTEX_SOCKET || '/tmp/cortex.sock';
"#;

const MAP_HANDLE: &str = r#"  const sm = await client.map(P.domain, { maxRender: 5, socketPath: SOCKET });
"#;

const MAP: &str = r#"  const sm = await client.map(P.domain, {
    maxNodes: P.max_nodes,
    maxRender: P.max_render,
    maxTimeMs: P.max_time_ms,
    respectRobots: P.respect_robots,
    socketPath: SOCKET,
  });
  return { node_count: sm.nodeCount, edge_count: sm.edgeCount, domain: sm.domain };
"#;

const QUERY: &str = r#"  const matches = P.mode === 'nearest'
    ? await sm.nearest(P.goal_vector || [], P.limit)
    : await sm.filter({
        pageType: P.page_type,
        features: P.features,
        flags: P.flags,
        sortBy: P.sort_by ? [P.sort_by.dimension, P.sort_by.direction] : undefined,
        limit: P.limit,
      });
  return matches.map(m => ({
    index: m.index,
    url: m.url,
    page_type: m.pageType,
    confidence: m.confidence,
    similarity: m.similarity === undefined ? null : m.similarity,
  }));
"#;

const PATHFIND: &str = r#"  const path = await sm.pathfind(P.from, P.to, {
    avoidFlags: P.avoid_flags,
    minimize: P.minimize,
  });
  if (path === null || path === undefined) {
    return null;
  }
  return {
    nodes: path.nodes,
    hops: path.hops,
    total_weight: path.totalWeight,
    required_actions: (path.requiredActions || []).map(a => ({
      at_node: a.atNode,
      opcode: Array.from(a.opcode),
    })),
  };
"#;

const REFRESH: &str = r#"  const r = await sm.refresh({
    nodes: P.nodes,
    cluster: P.cluster,
    staleThreshold: P.stale_threshold,
  });
  return { updated_count: r.updatedCount, changed_nodes: r.changedNodes };
"#;

const ACT: &str = r#"  const r = await sm.act(P.node, P.opcode, P.params, P.session_id);
  return {
    success: r.success,
    new_url: r.newUrl === undefined ? null : r.newUrl,
    features: r.features || {},
  };
"#;

const PERCEIVE: &str = r#"  const page = await client.perceive(P.url, {
    includeContent: P.include_content,
    socketPath: SOCKET,
  });
  return {
    final_url: page.finalUrl,
    page_type: page.pageType,
    confidence: page.confidence,
    content: page.content === undefined ? null : page.content,
  };
"#;

const WATCH: &str = r#"  await sm.watch({
    nodes: P.nodes,
    cluster: P.cluster,
    features: P.features,
    intervalMs: P.interval_ms,
  });
  return { acknowledged: true };
"#;

const STATUS: &str = r#"  const s = await client.status({ socketPath: SOCKET });
  return {
    version: s.version,
    uptime_seconds: s.uptimeSeconds,
    active_contexts: s.activeContexts,
    cached_maps: s.cachedMaps,
    memory_mb: s.memoryMb,
  };
"#;

const EMIT: &str = r#"})().then(
  out => { console.log(JSON.stringify(out === undefined ? null : out)); },
  e => { console.error(e && e.stack ? e.stack : String(e)); process.exit(1); },
);
"#;

/// Driver for the TypeScript client (`node -e`)
pub struct TypeScriptDriver;

impl Driver for TypeScriptDriver {
    fn eval_flag(&self) -> &'static str {
        "-e"
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
        program.push_str(&format!("const P = JSON.parse({});\n", args_literal(invocation)?));
        program.push_str("(async () => {\n");
        if invocation.map_handle().is_some() {
            program.push_str(MAP_HANDLE);
        }
        program.push_str(body);
        program.push_str(EMIT);
        Ok(program)
    }
}
