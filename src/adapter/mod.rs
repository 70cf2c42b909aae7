//! Client adapters
//!
//! An adapter executes one case's action against one client implementation
//! and returns the response in the canonical shape suites assert against.
//! Every adapter normalizes arguments through [`Invocation`], so defaults
//! and aliases are identical no matter which client issues the request.

pub mod native;
pub mod registry;
pub mod script;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::common::{Error, Result};
use crate::protocol::client::to_params;
use crate::protocol::types::{
    ActParams, MapParams, PathfindParams, PerceiveParams, QueryParams, RefreshParams, WatchParams,
};
use crate::protocol::Method;
use crate::testing::suite::Action;

pub use registry::{all_clients, get_adapter, get_client, parse_selection, ClientInfo, ClientKind};

/// Executes actions against one client implementation
#[async_trait]
pub trait ClientAdapter: Send + Sync {
    /// Client metadata
    fn info(&self) -> &ClientInfo;

    /// Run the action and return canonical response data
    ///
    /// `Ok(None)` is an absent result (a pathfind with no route).
    async fn execute(&self, action: &Action) -> Result<Option<Value>>;
}

/// A normalized protocol call
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Map(MapParams),
    Query(QueryParams),
    Pathfind(PathfindParams),
    Refresh(RefreshParams),
    Act(ActParams),
    Perceive(PerceiveParams),
    Watch(WatchParams),
    Status,
}

impl Invocation {
    /// Resolve an action's method and parse its args into typed params
    pub fn from_action(action: &Action) -> Result<Self> {
        let method: Method = action.method.parse()?;
        let args = Value::Object(action.args.clone());

        Ok(match method {
            Method::Map => Invocation::Map(parse_args(method, args)?),
            Method::Query => Invocation::Query(parse_args(method, args)?),
            Method::Pathfind => Invocation::Pathfind(parse_args(method, args)?),
            Method::Refresh => Invocation::Refresh(parse_args(method, args)?),
            Method::Act => Invocation::Act(parse_args(method, args)?),
            Method::Perceive => Invocation::Perceive(parse_args(method, args)?),
            Method::Watch => Invocation::Watch(parse_args(method, args)?),
            Method::Status => Invocation::Status,
        })
    }

    pub fn method(&self) -> Method {
        match self {
            Invocation::Map(_) => Method::Map,
            Invocation::Query(_) => Method::Query,
            Invocation::Pathfind(_) => Method::Pathfind,
            Invocation::Refresh(_) => Method::Refresh,
            Invocation::Act(_) => Method::Act,
            Invocation::Perceive(_) => Method::Perceive,
            Invocation::Watch(_) => Method::Watch,
            Invocation::Status => Method::Status,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            Invocation::Map(p) => Some(&p.domain),
            Invocation::Query(p) => Some(&p.domain),
            Invocation::Pathfind(p) => Some(&p.domain),
            Invocation::Refresh(p) => Some(&p.domain),
            Invocation::Act(p) => Some(&p.domain),
            Invocation::Watch(p) => Some(&p.domain),
            Invocation::Perceive(_) | Invocation::Status => None,
        }
    }

    /// The lightweight map every client issues before a domain-scoped call
    pub fn map_handle(&self) -> Option<MapParams> {
        if self.method().is_domain_scoped() {
            self.domain().map(MapParams::handle)
        } else {
            None
        }
    }

    /// Wire params, with defaults applied
    pub fn params(&self) -> Result<Map<String, Value>> {
        match self {
            Invocation::Map(p) => to_params(p),
            Invocation::Query(p) => to_params(p),
            Invocation::Pathfind(p) => to_params(p),
            Invocation::Refresh(p) => to_params(p),
            Invocation::Act(p) => to_params(p),
            Invocation::Perceive(p) => to_params(p),
            Invocation::Watch(p) => to_params(p),
            Invocation::Status => Ok(Map::new()),
        }
    }
}

fn parse_args<P: DeserializeOwned>(method: Method, args: Value) -> Result<P> {
    serde_json::from_value(args).map_err(|e| Error::invalid_arguments(method.as_str(), e.to_string()))
}
