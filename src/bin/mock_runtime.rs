//! Mock Cortex runtime for integration testing
//!
//! Speaks the Cortex protocol on a local socket so the harness can be
//! exercised without the real runtime. Mapping crawls a site's sitemap over
//! HTTP and keeps a small in-memory graph; every other method works on that
//! graph.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use futures_util::future::join_all;
use interprocess::local_socket::traits::tokio::Listener as ListenerTrait;
use regex::Regex;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::sync::RwLock;

use conformance::common::{logging, Error};
use conformance::protocol::transport::{self, Stream};
use conformance::protocol::types::{
    ActParams, MapParams, PathfindParams, PerceiveParams, QueryParams, RefreshParams, WatchParams,
};
use conformance::protocol::{ErrorBody, Method, Request, Response, E_NO_PATH};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Page types by URL shape
const PAGE_OTHER: u32 = 0;
const PAGE_HOME: u32 = 1;
const PAGE_PRODUCT_LISTING: u32 = 4;
const PAGE_PRODUCT_DETAIL: u32 = 5;

/// Flag set on nodes whose page contains a form
const FLAG_HAS_FORM: &str = "has_form";

#[derive(Parser)]
#[command(name = "mock-runtime", about = "Protocol-speaking stand-in for the Cortex runtime")]
struct Args {
    /// Socket path to listen on
    #[arg(long)]
    socket: PathBuf,

    /// Directory for the log file
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _guard = logging::init_mock_runtime(args.log_dir.as_deref());

    if let Err(e) = serve(&args.socket).await {
        tracing::error!("Mock runtime failed: {}", e);
        std::process::exit(1);
    }
}

async fn serve(socket: &std::path::Path) -> Result<(), Error> {
    let listener = transport::listen(socket)?;
    let runtime = Arc::new(MockRuntime::new()?);

    tracing::info!(socket = %socket.display(), "Mock runtime listening");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down");
                break;
            }
            accept_result = listener.accept() => {
                match accept_result {
                    Ok(stream) => {
                        let runtime = Arc::clone(&runtime);
                        tokio::spawn(async move {
                            if let Err(e) = handle_client(runtime, stream).await {
                                tracing::error!("Error handling client: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::error!("Accept error: {}", e),
                }
            }
        }
    }

    let _ = std::fs::remove_file(socket);
    Ok(())
}

/// Serve requests on one connection until the client disconnects
async fn handle_client(runtime: Arc<MockRuntime>, stream: Stream) -> Result<(), Error> {
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    loop {
        let data = match transport::recv_frame(&mut reader).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("Client disconnected");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let response = match serde_json::from_slice::<Request>(&data) {
            Ok(request) => {
                tracing::debug!(id = %request.id, method = %request.method, "Request");
                let id = request.id.clone();
                match runtime.dispatch(&request).await {
                    Ok(result) => Response::success(id, result),
                    Err(body) => {
                        tracing::debug!(id = %request.id, code = %body.code, "Error response");
                        Response::error(id, body)
                    }
                }
            }
            Err(e) => Response::error("", ErrorBody::new("E_INVALID_REQUEST", e.to_string())),
        };

        transport::send_frame(&mut writer, &serde_json::to_vec(&response)?).await?;
    }
}

/// One crawled page
#[derive(Debug, Clone)]
struct Node {
    url: Url,
    page_type: u32,
    has_form: bool,
    body: String,
}

impl Node {
    fn confidence(&self) -> f64 {
        if self.page_type == PAGE_OTHER {
            0.5
        } else {
            0.9
        }
    }

    fn has_flag(&self, flag: &str) -> bool {
        flag == FLAG_HAS_FORM && self.has_form
    }
}

/// A mapped domain
#[derive(Debug, Clone)]
struct SiteGraph {
    nodes: Vec<Node>,
    adjacency: Vec<Vec<usize>>,
}

impl SiteGraph {
    fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// Feature vector: page type, form flag, out-degree
    fn features(&self, index: usize) -> [f64; 3] {
        let node = &self.nodes[index];
        [
            f64::from(node.page_type),
            f64::from(u8::from(node.has_form)),
            self.adjacency[index].len() as f64,
        ]
    }

    fn feature_map(&self, index: usize) -> BTreeMap<String, f64> {
        self.features(index)
            .iter()
            .enumerate()
            .map(|(dim, v)| (dim.to_string(), *v))
            .collect()
    }

    fn node(&self, index: u32) -> Result<&Node, ErrorBody> {
        self.nodes.get(index as usize).ok_or_else(|| {
            ErrorBody::new(
                "E_NODE_NOT_FOUND",
                format!("node {} out of range (0..{})", index, self.nodes.len()),
            )
        })
    }

    /// Breadth-first route that never enters a node carrying an avoided flag
    fn shortest_path(&self, from: usize, to: usize, avoid: &[String]) -> Option<Vec<usize>> {
        let blocked = |i: usize| avoid.iter().any(|flag| self.nodes[i].has_flag(flag));

        let mut previous: Vec<Option<usize>> = vec![None; self.nodes.len()];
        let mut visited = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([from]);
        visited[from] = true;

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut at = to;
                while let Some(prev) = previous[at] {
                    path.push(prev);
                    at = prev;
                }
                path.reverse();
                return Some(path);
            }
            for &next in &self.adjacency[current] {
                if !visited[next] && !blocked(next) {
                    visited[next] = true;
                    previous[next] = Some(current);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

/// Extracts sitemap locations, anchors and text from fetched documents
struct Scraper {
    loc: Regex,
    href: Regex,
    tag: Regex,
}

impl Scraper {
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            loc: Regex::new(r"(?is)<loc>\s*([^<]+?)\s*</loc>")?,
            href: Regex::new(
                r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#,
            )?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
        })
    }

    /// Absolute URLs listed in a sitemap; unparsable entries are skipped
    fn sitemap_urls(&self, sitemap: &str) -> Vec<Url> {
        self.loc
            .captures_iter(sitemap)
            .filter_map(|caps| Url::parse(caps.get(1)?.as_str()).ok())
            .collect()
    }

    /// Anchor targets of a page, resolved against the page URL without fragments
    fn links(&self, page: &Url, body: &str) -> Vec<Url> {
        self.href
            .captures_iter(body)
            .filter_map(|caps| {
                let href = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3))?;
                let mut target = page.join(href.as_str().trim()).ok()?;
                target.set_fragment(None);
                Some(target)
            })
            .collect()
    }

    fn text(&self, html: &str) -> String {
        let stripped = self.tag.replace_all(html, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

struct MockRuntime {
    http: reqwest::Client,
    scraper: Scraper,
    maps: RwLock<HashMap<String, SiteGraph>>,
    started: Instant,
    next_watch: AtomicU64,
}

impl MockRuntime {
    fn new() -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client: {}", e)))?;
        let scraper = Scraper::new().map_err(|e| Error::Internal(format!("scraper: {}", e)))?;
        Ok(Self {
            http,
            scraper,
            maps: RwLock::new(HashMap::new()),
            started: Instant::now(),
            next_watch: AtomicU64::new(1),
        })
    }

    async fn dispatch(&self, request: &Request) -> Result<Value, ErrorBody> {
        let method = request.validate().map_err(|e| match e {
            Error::UnknownMethod(name) => {
                ErrorBody::new("E_UNKNOWN_METHOD", format!("unknown method: {}", name))
            }
            other => ErrorBody::new("E_INVALID_PARAMS", other.to_string()),
        })?;
        let params = Value::Object(request.params.clone());

        match method {
            Method::Map => self.map(parse(params)?).await,
            Method::Query => self.query(parse(params)?).await,
            Method::Pathfind => self.pathfind(parse(params)?).await,
            Method::Refresh => self.refresh(parse(params)?).await,
            Method::Act => self.act(parse(params)?).await,
            Method::Perceive => self.perceive(parse(params)?).await,
            Method::Watch => self.watch(parse(params)?).await,
            Method::Status => Ok(self.status().await),
        }
    }

    async fn fetch(&self, url: &Url) -> Result<(Url, String), String> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;
        let final_url = response.url().clone();
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok((final_url, body))
    }

    /// Path prefixes disallowed for every user agent
    async fn disallowed(&self, base: &Url) -> Vec<String> {
        let Ok(robots_url) = base.join("/robots.txt") else {
            return Vec::new();
        };
        match self.fetch(&robots_url).await {
            Ok((_, robots)) => robots
                .lines()
                .filter_map(|line| line.trim().strip_prefix("Disallow:"))
                .map(|path| path.trim().to_string())
                .filter(|path| !path.is_empty())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    async fn map(&self, params: MapParams) -> Result<Value, ErrorBody> {
        let base = Url::parse(&format!("http://{}/", params.domain)).map_err(|e| {
            ErrorBody::new("E_INVALID_PARAMS", format!("domain {}: {}", params.domain, e))
        })?;
        let started = Instant::now();

        let disallowed = if params.respect_robots {
            self.disallowed(&base).await
        } else {
            Vec::new()
        };

        let sitemap_url = base
            .join("/sitemap.xml")
            .map_err(|e| ErrorBody::new("E_INVALID_PARAMS", e.to_string()))?;
        let (_, sitemap) = self
            .fetch(&sitemap_url)
            .await
            .map_err(|e| ErrorBody::new("E_MAP_FAILED", format!("sitemap: {}", e)))?;

        let urls: Vec<Url> = self
            .scraper
            .sitemap_urls(&sitemap)
            .into_iter()
            .filter(|url| !is_disallowed(url, &disallowed))
            .take(params.max_nodes as usize)
            .collect();

        let bodies = join_all(urls.iter().map(|url| self.fetch(url))).await;

        let nodes: Vec<Node> = urls
            .iter()
            .zip(bodies)
            .map(|(url, fetched)| {
                let body = fetched.map(|(_, body)| body).unwrap_or_default();
                Node {
                    url: url.clone(),
                    page_type: classify(url),
                    has_form: body.contains("<form"),
                    body,
                }
            })
            .collect();

        let adjacency = nodes
            .iter()
            .map(|node| {
                let mut targets: Vec<usize> = Vec::new();
                for target in self.scraper.links(&node.url, &node.body) {
                    if let Some(i) = nodes.iter().position(|n| n.url == target) {
                        if !targets.contains(&i) {
                            targets.push(i);
                        }
                    }
                }
                targets
            })
            .collect();

        let graph = SiteGraph { nodes, adjacency };
        let summary = json!({
            "node_count": graph.nodes.len(),
            "edge_count": graph.edge_count(),
            "domain": params.domain,
            "map_path": null,
        });

        tracing::info!(
            domain = %params.domain,
            nodes = graph.nodes.len(),
            edges = graph.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Mapped domain"
        );

        self.maps.write().await.insert(params.domain, graph);
        Ok(summary)
    }

    async fn graph(&self, domain: &str) -> Result<SiteGraph, ErrorBody> {
        self.maps.read().await.get(domain).cloned().ok_or_else(|| {
            ErrorBody::new("E_MAP_NOT_FOUND", format!("{} has not been mapped", domain))
        })
    }

    async fn query(&self, params: QueryParams) -> Result<Value, ErrorBody> {
        let graph = self.graph(&params.domain).await?;

        let mut matches: Vec<(usize, Option<f64>)> = if params.is_nearest() {
            let goal = params.goal_vector.clone().unwrap_or_default();
            let mut scored: Vec<(usize, Option<f64>)> = (0..graph.nodes.len())
                .map(|i| (i, Some(cosine(&graph.features(i), &goal))))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored
        } else {
            (0..graph.nodes.len())
                .filter(|&i| node_matches(&graph, i, &params))
                .map(|i| (i, None))
                .collect()
        };

        if let Some(sort) = &params.sort_by {
            let dim = sort.dimension as usize;
            let key = |i: usize| graph.features(i).get(dim).copied().unwrap_or(0.0);
            matches.sort_by(|a, b| {
                key(a.0)
                    .partial_cmp(&key(b.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if sort.direction == "desc" {
                matches.reverse();
            }
        }

        let matches: Vec<Value> = matches
            .into_iter()
            .take(params.limit as usize)
            .map(|(i, similarity)| {
                let node = &graph.nodes[i];
                json!({
                    "index": i,
                    "url": node.url.as_str(),
                    "page_type": node.page_type,
                    "confidence": node.confidence(),
                    "features": graph.feature_map(i),
                    "similarity": similarity,
                })
            })
            .collect();

        Ok(json!({ "matches": matches }))
    }

    async fn pathfind(&self, params: PathfindParams) -> Result<Value, ErrorBody> {
        let graph = self.graph(&params.domain).await?;
        graph.node(params.from)?;
        graph.node(params.to)?;

        let avoid = params.avoid_flags.unwrap_or_default();
        let path = graph
            .shortest_path(params.from as usize, params.to as usize, &avoid)
            .ok_or_else(|| {
                ErrorBody::new(
                    E_NO_PATH,
                    format!("no route from {} to {}", params.from, params.to),
                )
            })?;

        let hops = path.len() - 1;
        let required_actions: Vec<Value> = path
            .iter()
            .skip(1)
            .filter(|&&i| graph.nodes[i].has_form)
            .map(|&i| json!({"at_node": i, "opcode": [4, 0]}))
            .collect();

        Ok(json!({
            "nodes": path,
            "total_weight": hops as f64,
            "hops": hops,
            "required_actions": required_actions,
        }))
    }

    async fn refresh(&self, params: RefreshParams) -> Result<Value, ErrorBody> {
        let graph = self.graph(&params.domain).await?;

        let targets: Vec<usize> = match &params.nodes {
            Some(nodes) => {
                for &n in nodes {
                    graph.node(n)?;
                }
                nodes.iter().map(|&n| n as usize).collect()
            }
            None => (0..graph.nodes.len()).collect(),
        };

        let fetched = join_all(targets.iter().map(|&i| self.fetch(&graph.nodes[i].url))).await;

        let mut changed = Vec::new();
        let mut updated = graph.clone();
        for (&i, result) in targets.iter().zip(fetched) {
            if let Ok((_, body)) = result {
                if body != updated.nodes[i].body {
                    changed.push(i);
                    updated.nodes[i].has_form = body.contains("<form");
                    updated.nodes[i].body = body;
                }
            }
        }

        self.maps.write().await.insert(params.domain, updated);
        Ok(json!({
            "updated_count": targets.len(),
            "changed_nodes": changed,
        }))
    }

    async fn act(&self, params: ActParams) -> Result<Value, ErrorBody> {
        let graph = self.graph(&params.domain).await?;
        let node = graph.node(params.node)?;

        tracing::debug!(node = params.node, opcode = ?params.opcode, "Act");

        let success = self.fetch(&node.url).await.is_ok();
        Ok(json!({
            "success": success,
            "new_url": node.url.as_str(),
            "features": graph.feature_map(params.node as usize),
        }))
    }

    async fn perceive(&self, params: PerceiveParams) -> Result<Value, ErrorBody> {
        let url = Url::parse(&params.url)
            .map_err(|e| ErrorBody::new("E_INVALID_PARAMS", format!("{}: {}", params.url, e)))?;
        let (final_url, body) = self
            .fetch(&url)
            .await
            .map_err(|e| ErrorBody::new("E_NOT_FOUND", format!("{}: {}", params.url, e)))?;

        let node = Node {
            page_type: classify(&url),
            url: final_url,
            has_form: body.contains("<form"),
            body,
        };
        let content = params
            .include_content
            .then(|| self.scraper.text(&node.body));
        let features = BTreeMap::from([
            ("0".to_string(), f64::from(node.page_type)),
            ("1".to_string(), f64::from(u8::from(node.has_form))),
        ]);

        Ok(json!({
            "final_url": node.url.as_str(),
            "page_type": node.page_type,
            "confidence": node.confidence(),
            "features": features,
            "content": content,
        }))
    }

    async fn watch(&self, params: WatchParams) -> Result<Value, ErrorBody> {
        self.graph(&params.domain).await?;
        let id = self.next_watch.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(domain = %params.domain, interval_ms = params.interval_ms, "Watch registered");
        Ok(json!({
            "watch_id": format!("watch-{}", id),
            "interval_ms": params.interval_ms,
        }))
    }

    async fn status(&self) -> Value {
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": self.started.elapsed().as_secs_f64(),
            "active_contexts": 0,
            "cached_maps": self.maps.read().await.len(),
            "memory_mb": 0.0,
        })
    }
}

fn parse<P: DeserializeOwned>(params: Value) -> Result<P, ErrorBody> {
    serde_json::from_value(params).map_err(|e| ErrorBody::new("E_INVALID_PARAMS", e.to_string()))
}

fn node_matches(graph: &SiteGraph, index: usize, params: &QueryParams) -> bool {
    let node = &graph.nodes[index];

    if let Some(types) = &params.page_type {
        if !types.contains(&node.page_type) {
            return false;
        }
    }

    if let Some(flags) = &params.flags {
        if flags.iter().any(|(flag, want)| node.has_flag(flag) != *want) {
            return false;
        }
    }

    if let Some(ranges) = &params.features {
        let features = graph.features(index);
        for (dim, bounds) in ranges {
            let Some(value) = dim.parse::<usize>().ok().and_then(|d| features.get(d)) else {
                return false;
            };
            let ok = bounds.iter().all(|(op, bound)| match op.as_str() {
                "gt" => value > bound,
                "gte" => value >= bound,
                "lt" => value < bound,
                "lte" => value <= bound,
                "eq" => value == bound,
                _ => true,
            });
            if !ok {
                return false;
            }
        }
    }

    true
}

fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn classify(url: &Url) -> u32 {
    match url.path() {
        "/" => PAGE_HOME,
        "/products" => PAGE_PRODUCT_LISTING,
        p if p.starts_with("/products/") => PAGE_PRODUCT_DETAIL,
        _ => PAGE_OTHER,
    }
}

/// Whether robots.txt excludes a URL; matched on the path alone
fn is_disallowed(url: &Url, disallowed: &[String]) -> bool {
    let path = url.path();
    disallowed.iter().any(|prefix| path.starts_with(prefix.as_str()))
}
