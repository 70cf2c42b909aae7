//! Fixture site
//!
//! A small, closed HTTP site the runtime maps during conformance runs. It
//! binds once per harness invocation on an OS-chosen port (or a fixed one),
//! serves from a background task, and shares nothing mutable with the rest
//! of the harness.

pub mod corpus;
mod server;

use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::common::{Error, Result};

pub use server::{router, FixtureState};

/// A running fixture site
pub struct FixtureSite {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl FixtureSite {
    /// Bind and start serving
    ///
    /// `port` 0 lets the operating system choose. Failing to bind is the one
    /// failure that aborts a harness run.
    pub async fn start(host: IpAddr, port: u16) -> Result<Self> {
        let requested = SocketAddr::new(host, port);
        let listener = TcpListener::bind(requested)
            .await
            .map_err(|source| Error::FixtureBind {
                addr: requested.to_string(),
                source,
            })?;
        let addr = listener.local_addr()?;

        let (tx, rx) = oneshot::channel::<()>();
        let app = router(addr.port());

        let task = tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!("Fixture server error: {}", e);
            }
        });

        tracing::info!(%addr, "Fixture site listening");

        Ok(Self {
            addr,
            shutdown: Some(tx),
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Domain string suites use for the site (`localhost:<port>`)
    pub fn domain(&self) -> String {
        format!("localhost:{}", self.port())
    }

    /// Base URL reachable from this host
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Fixture server task ended abnormally: {}", e);
        }
        tracing::debug!("Fixture site stopped");
    }
}

impl Drop for FixtureSite {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
