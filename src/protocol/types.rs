//! Typed request params and response records
//!
//! Params records carry the defaults every client applies, so a declarative
//! case with sparse `args` produces the same request no matter which client
//! issues it.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// === Request params ===

/// Params for `map`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapParams {
    pub domain: String,
    #[serde(default = "default_max_nodes")]
    pub max_nodes: u64,
    #[serde(default = "default_max_render")]
    pub max_render: u64,
    #[serde(default = "default_max_time_ms")]
    pub max_time_ms: u64,
    #[serde(default = "default_true")]
    pub respect_robots: bool,
}

impl MapParams {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            max_nodes: default_max_nodes(),
            max_render: default_max_render(),
            max_time_ms: default_max_time_ms(),
            respect_robots: true,
        }
    }

    /// The lightweight map issued before domain-scoped calls
    pub fn handle(domain: impl Into<String>) -> Self {
        Self {
            max_render: 5,
            ..Self::new(domain)
        }
    }
}

fn default_max_nodes() -> u64 {
    50_000
}
fn default_max_render() -> u64 {
    200
}
fn default_max_time_ms() -> u64 {
    10_000
}
fn default_true() -> bool {
    true
}

/// Sort order for `query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortBy {
    pub dimension: u32,
    pub direction: String,
}

/// Params for `query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub domain: String,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Option::is_none"
    )]
    pub page_type: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<BTreeMap<String, BTreeMap<String, f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<BTreeMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_vector: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl QueryParams {
    pub fn is_nearest(&self) -> bool {
        self.mode.as_deref() == Some("nearest")
    }
}

fn default_limit() -> u64 {
    100
}

/// Accept either a single page type or a list of them
fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(u32),
        Many(Vec<u32>),
    }

    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(ts) => ts,
        }),
    )
}

/// Params for `pathfind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathfindParams {
    pub domain: String,
    #[serde(alias = "from_node")]
    pub from: u32,
    #[serde(alias = "to_node")]
    pub to: u32,
    #[serde(default = "default_minimize")]
    pub minimize: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_flags: Option<Vec<String>>,
}

fn default_minimize() -> String {
    "hops".to_string()
}

/// Params for `refresh`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshParams {
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_threshold: Option<f64>,
}

/// Params for `act`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActParams {
    pub domain: String,
    pub node: u32,
    /// `[category, action]`
    pub opcode: [u32; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Params for `perceive`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceiveParams {
    pub url: String,
    #[serde(default = "default_true")]
    pub include_content: bool,
}

/// Params for `watch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchParams {
    pub domain: String,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<u32>>,
}

fn default_interval_ms() -> u64 {
    60_000
}

// === Response records ===

/// Result of `map`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSummary {
    #[serde(default)]
    pub node_count: u64,
    #[serde(default)]
    pub edge_count: u64,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub map_path: Option<String>,
}

/// A node returned by `query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMatch {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub page_type: u32,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    #[serde(default)]
    pub similarity: Option<f64>,
}

/// An action required at a node along a path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAction {
    pub at_node: u32,
    pub opcode: [u32; 2],
}

/// Result of `pathfind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    #[serde(default)]
    pub nodes: Vec<u32>,
    #[serde(default)]
    pub total_weight: f64,
    #[serde(default)]
    pub hops: u32,
    #[serde(default)]
    pub required_actions: Vec<PathAction>,
}

/// Result of `refresh`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshResult {
    #[serde(default)]
    pub updated_count: u64,
    #[serde(default)]
    pub changed_nodes: Vec<u32>,
}

/// Result of `act`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub new_url: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
}

/// Result of `perceive`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    #[serde(default)]
    pub final_url: String,
    #[serde(default)]
    pub page_type: u32,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    #[serde(default)]
    pub content: Option<String>,
}

/// Result of `status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeStatus {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub uptime_seconds: f64,
    #[serde(default)]
    pub active_contexts: u64,
    #[serde(default)]
    pub cached_maps: u64,
    #[serde(default)]
    pub memory_mb: f64,
}
