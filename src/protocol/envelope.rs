//! Protocol envelope
//!
//! Every client and the runtime agree on this framing: a request carries an
//! `id`, a `method` and a `params` mapping; a response carries exactly one of
//! `result` or `error`. Frames are UTF-8 JSON objects terminated by a single
//! newline (see [`super::transport`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::common::{Error, Result};

/// Error code the runtime uses when no route exists between two nodes
pub const E_NO_PATH: &str = "E_NO_PATH";

/// Protocol method vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Map,
    Query,
    Pathfind,
    Refresh,
    Act,
    Perceive,
    Watch,
    Status,
}

impl Method {
    pub const ALL: [Method; 8] = [
        Method::Map,
        Method::Query,
        Method::Pathfind,
        Method::Refresh,
        Method::Act,
        Method::Perceive,
        Method::Watch,
        Method::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Map => "map",
            Method::Query => "query",
            Method::Pathfind => "pathfind",
            Method::Refresh => "refresh",
            Method::Act => "act",
            Method::Perceive => "perceive",
            Method::Watch => "watch",
            Method::Status => "status",
        }
    }

    /// Params keys that must be present in every request for this method
    pub fn required_params(&self) -> &'static [&'static str] {
        match self {
            Method::Map => &[
                "domain",
                "max_nodes",
                "max_render",
                "max_time_ms",
                "respect_robots",
            ],
            Method::Query => &["domain", "limit"],
            Method::Pathfind => &["domain", "from", "to", "minimize"],
            Method::Refresh => &["domain"],
            Method::Act => &["domain", "node", "opcode"],
            Method::Perceive => &["url", "include_content"],
            Method::Watch => &["domain", "interval_ms"],
            Method::Status => &[],
        }
    }

    /// Whether the method operates on an already-mapped domain
    pub fn is_domain_scoped(&self) -> bool {
        matches!(
            self,
            Method::Query | Method::Pathfind | Method::Refresh | Method::Act | Method::Watch
        )
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::UnknownMethod(s.to_string()))
    }
}

/// A request frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id, unique within one connection
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Request {
    pub fn new(id: impl Into<String>, method: Method, params: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            method: method.as_str().to_string(),
            params,
        }
    }

    /// Resolve the method name against the vocabulary
    pub fn method(&self) -> Result<Method> {
        self.method.parse()
    }

    /// Check that every required params key for the method is present
    pub fn validate(&self) -> Result<Method> {
        let method = self.method()?;
        let missing: Vec<&str> = method
            .required_params()
            .iter()
            .copied()
            .filter(|key| !self.params.contains_key(*key))
            .collect();

        if missing.is_empty() {
            Ok(method)
        } else {
            Err(Error::invalid_arguments(
                method.as_str(),
                format!("missing required params: {}", missing.join(", ")),
            ))
        }
    }
}

/// Error body carried by a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_no_path(&self) -> bool {
        self.code == E_NO_PATH
    }
}

/// Outcome of a request: a result mapping or an error, never both
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Result(Value),
    Error(ErrorBody),
}

/// A response frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawResponse", into = "RawResponse")]
pub struct Response {
    /// Echo of the request id, when the runtime provides one
    pub id: Option<String>,
    pub outcome: Outcome,
}

impl Response {
    /// Create a success response
    pub fn success(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: Some(id.into()),
            outcome: Outcome::Result(result),
        }
    }

    /// Create an error response
    pub fn error(id: impl Into<String>, error: ErrorBody) -> Self {
        Self {
            id: Some(id.into()),
            outcome: Outcome::Error(error),
        }
    }

    /// Convert into the result value, raising protocol errors
    pub fn into_result(self) -> Result<Value> {
        match self.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Error(body) => Err(body.into()),
        }
    }
}

/// Wire shape of a response before the exactly-one rule is enforced
#[derive(Serialize, Deserialize)]
struct RawResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl TryFrom<RawResponse> for Response {
    type Error = String;

    fn try_from(raw: RawResponse) -> std::result::Result<Self, Self::Error> {
        let outcome = match (raw.result, raw.error) {
            (Some(result), None) => Outcome::Result(result),
            (None, Some(error)) => Outcome::Error(error),
            (Some(_), Some(_)) => {
                return Err("response carries both 'result' and 'error'".to_string())
            }
            (None, None) => return Err("response carries neither 'result' nor 'error'".to_string()),
        };
        Ok(Response {
            id: raw.id,
            outcome,
        })
    }
}

impl From<Response> for RawResponse {
    fn from(response: Response) -> Self {
        let (result, error) = match response.outcome {
            Outcome::Result(value) => (Some(value), None),
            Outcome::Error(body) => (None, Some(body)),
        };
        RawResponse {
            id: response.id,
            result,
            error,
        }
    }
}
