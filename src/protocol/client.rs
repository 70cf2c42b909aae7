//! Native client for the Cortex runtime
//!
//! One `Connection` owns one socket and carries one request at a time.
//! Callers that need concurrency must each own a connection (or share one
//! behind a lock); the protocol makes no pipelining guarantee.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{BufReader, ReadHalf, WriteHalf};

use crate::common::{Error, Result};

use super::envelope::{Method, Outcome, Request, Response};
use super::transport::{self, Stream};
use super::types::{
    ActParams, ActResult, MapParams, MapSummary, NodeMatch, PageResult, PathResult,
    PathfindParams, PerceiveParams, QueryParams, RefreshParams, RefreshResult, RuntimeStatus,
    WatchParams,
};

/// Default deadline for one request/response exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

struct Io {
    reader: BufReader<ReadHalf<Stream>>,
    writer: WriteHalf<Stream>,
}

/// Connection to the runtime over its local socket
pub struct Connection {
    socket_path: PathBuf,
    timeout: Duration,
    io: Option<Io>,
    next_id: u64,
}

impl Connection {
    /// Create an unconnected client; the socket is opened on first use
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
            io: None,
            next_id: 1,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn is_connected(&self) -> bool {
        self.io.is_some()
    }

    /// Open the socket
    ///
    /// A missing socket path and a refused connection are reported as
    /// distinct errors.
    pub async fn connect(&mut self) -> Result<()> {
        let connect = transport::connect(&self.socket_path);
        let stream = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| Error::timeout("connect", self.timeout))?
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => Error::SocketNotFound(self.socket_path.clone()),
                io::ErrorKind::ConnectionRefused => {
                    Error::ConnectionRefused(self.socket_path.clone())
                }
                _ => Error::ConnectionFailed(e),
            })?;

        let (reader, writer) = tokio::io::split(stream);
        self.io = Some(Io {
            reader: BufReader::new(reader),
            writer,
        });
        tracing::debug!(socket = %self.socket_path.display(), "Connected to runtime");
        Ok(())
    }

    /// Drop the socket; the next request reconnects
    pub fn close(&mut self) {
        self.io = None;
    }

    /// Send a request and return the raw response envelope
    ///
    /// If the peer closed its side while the request was being written, the
    /// connection is re-established and the request retried exactly once.
    pub async fn send(&mut self, method: Method, params: Map<String, Value>) -> Result<Response> {
        if self.io.is_none() {
            self.connect().await?;
        }

        let id = format!("req-{}", self.next_id);
        self.next_id += 1;

        let request = Request::new(id.clone(), method, params);
        let frame = serde_json::to_vec(&request)?;

        tracing::debug!(id = %id, method = %method, "Sending request");

        match self.write_frame(&frame).await {
            Ok(()) => {}
            Err(WriteError::Io(e)) if is_peer_closed(&e) => {
                tracing::warn!(id = %id, error = %e, "Runtime closed the connection, reconnecting once");
                self.close();
                self.connect().await?;
                self.write_frame(&frame).await.map_err(|e| self.fail(e))?;
            }
            Err(e) => return Err(self.fail(e)),
        }

        let response = self.read_response().await?;
        if let Some(response_id) = &response.id {
            if response_id != &id {
                self.close();
                return Err(Error::MalformedResponse(format!(
                    "Response ID mismatch: expected {}, got {}",
                    id, response_id
                )));
            }
        }

        tracing::debug!(id = %id, ok = matches!(response.outcome, Outcome::Result(_)), "Received response");
        Ok(response)
    }

    /// Send a request and return its result, raising error responses
    pub async fn call(&mut self, method: Method, params: Map<String, Value>) -> Result<Value> {
        self.send(method, params).await?.into_result()
    }

    async fn call_with<P: Serialize>(&mut self, method: Method, params: &P) -> Result<Value> {
        self.call(method, to_params(params)?).await
    }

    async fn write_frame(&mut self, frame: &[u8]) -> std::result::Result<(), WriteError> {
        let io = self.io.as_mut().ok_or(WriteError::NotConnected)?;
        tokio::time::timeout(self.timeout, transport::send_frame(&mut io.writer, frame))
            .await
            .map_err(|_| WriteError::Timeout)?
            .map_err(WriteError::Io)
    }

    async fn read_response(&mut self) -> Result<Response> {
        let timeout = self.timeout;
        let io = self.io.as_mut().ok_or(Error::ConnectionClosed)?;

        let data = match tokio::time::timeout(timeout, transport::recv_frame(&mut io.reader)).await
        {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                self.close();
                return Err(if e.kind() == io::ErrorKind::UnexpectedEof {
                    Error::ConnectionClosed
                } else {
                    Error::ConnectionFailed(e)
                });
            }
            Err(_) => {
                // A late response would desynchronize the next exchange
                self.close();
                return Err(Error::timeout("response", timeout));
            }
        };

        serde_json::from_slice(&data).map_err(|e| {
            self.close();
            Error::MalformedResponse(e.to_string())
        })
    }

    fn fail(&mut self, e: WriteError) -> Error {
        self.close();
        match e {
            WriteError::NotConnected => Error::ConnectionClosed,
            WriteError::Timeout => Error::timeout("request write", self.timeout),
            WriteError::Io(e) => Error::ConnectionFailed(e),
        }
    }

    // === Typed methods ===

    /// Map a domain
    pub async fn map(&mut self, params: &MapParams) -> Result<MapSummary> {
        let result = self.call_with(Method::Map, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Filter or rank the nodes of a mapped domain
    pub async fn query(&mut self, params: &QueryParams) -> Result<Vec<NodeMatch>> {
        let result = self.call_with(Method::Query, params).await?;
        let matches = result.get("matches").cloned().unwrap_or(Value::Array(Vec::new()));
        Ok(serde_json::from_value(matches)?)
    }

    /// Find a route between two nodes
    ///
    /// `Ok(None)` when the runtime reports `E_NO_PATH`.
    pub async fn pathfind(&mut self, params: &PathfindParams) -> Result<Option<PathResult>> {
        let response = self.send(Method::Pathfind, to_params(params)?).await?;
        match response.outcome {
            Outcome::Result(value) => Ok(Some(serde_json::from_value(value)?)),
            Outcome::Error(body) if body.is_no_path() => Ok(None),
            Outcome::Error(body) => Err(body.into()),
        }
    }

    /// Re-render nodes of a mapped domain
    pub async fn refresh(&mut self, params: &RefreshParams) -> Result<RefreshResult> {
        let result = self.call_with(Method::Refresh, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Execute an action on a live page
    pub async fn act(&mut self, params: &ActParams) -> Result<ActResult> {
        let result = self.call_with(Method::Act, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Perceive a single page
    pub async fn perceive(&mut self, params: &PerceiveParams) -> Result<PageResult> {
        let result = self.call_with(Method::Perceive, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Register a watch; only the acknowledgement is consumed
    pub async fn watch(&mut self, params: &WatchParams) -> Result<Value> {
        self.call_with(Method::Watch, params).await
    }

    /// Get runtime status
    pub async fn status(&mut self) -> Result<RuntimeStatus> {
        let result = self.call(Method::Status, Map::new()).await?;
        Ok(serde_json::from_value(result)?)
    }
}

enum WriteError {
    NotConnected,
    Timeout,
    Io(io::Error),
}

/// Whether a write failed because the peer closed its side
fn is_peer_closed(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::NotConnected
    )
}

/// Serialize a params record into a request params mapping
pub fn to_params<P: Serialize>(params: &P) -> Result<Map<String, Value>> {
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Internal(format!(
            "params must serialize to an object, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::MapParams;
    use serde_json::json;

    #[test]
    fn test_to_params_is_object() {
        let params = to_params(&MapParams::new("localhost:1234")).unwrap();
        assert_eq!(params.get("domain"), Some(&json!("localhost:1234")));
        assert_eq!(params.get("respect_robots"), Some(&json!(true)));
        assert!(to_params(&3).is_err());
    }

    #[test]
    fn test_peer_closed_kinds() {
        assert!(is_peer_closed(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_peer_closed(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_peer_closed(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_missing_socket_is_distinct_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = Connection::new(dir.path().join("absent.sock"), Duration::from_secs(1));

        let err = conn.status().await.unwrap_err();
        assert!(matches!(err, Error::SocketNotFound(_)), "got {err:?}");
        assert!(err.is_connection_failure());
        assert!(!conn.is_connected());
    }
}
