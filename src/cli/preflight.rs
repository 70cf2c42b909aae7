//! Checks run before any suite
//!
//! The fixture site must answer or nothing can pass. The runtime is only
//! probed: when it is down every case fails with the connection detail, so
//! a warning is enough here.

use std::io;
use std::path::Path;
use std::time::Duration;

use crate::common::{Error, Result};
use crate::fixture::FixtureSite;
use crate::protocol::transport;

const PREFLIGHT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetch `/robots.txt` from the fixture site
pub async fn check_fixture(site: &FixtureSite) -> Result<()> {
    let url = format!("{}/robots.txt", site.base_url());

    let client = reqwest::Client::builder()
        .timeout(PREFLIGHT_TIMEOUT)
        .build()
        .map_err(|e| Error::FixturePreflight(e.to_string()))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Error::FixturePreflight(format!("GET {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(Error::FixturePreflight(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| Error::FixturePreflight(format!("GET {}: {}", url, e)))?;
    if !body.contains(&site.port().to_string()) {
        return Err(Error::FixturePreflight(format!(
            "robots.txt does not reference port {}",
            site.port()
        )));
    }

    tracing::debug!(%url, "Fixture site answered");
    Ok(())
}

/// Probe the runtime socket and warn if it cannot be reached
///
/// Returns whether the runtime accepted a connection.
pub async fn probe_runtime(socket: &Path) -> bool {
    match tokio::time::timeout(PREFLIGHT_TIMEOUT, transport::connect(socket)).await {
        Ok(Ok(_)) => {
            tracing::debug!(socket = %socket.display(), "Runtime socket reachable");
            true
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(
                socket = %socket.display(),
                "Cortex is not running (socket not found); start it with `cortex start`"
            );
            false
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            tracing::warn!(
                socket = %socket.display(),
                "Cortex refused the connection; the socket may be stale"
            );
            false
        }
        Ok(Err(e)) => {
            tracing::warn!(socket = %socket.display(), error = %e, "Cannot connect to Cortex");
            false
        }
        Err(_) => {
            tracing::warn!(socket = %socket.display(), "Timed out connecting to Cortex");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    #[tokio::test]
    async fn test_fixture_preflight_passes_on_live_site() {
        let site = FixtureSite::start(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
            .await
            .unwrap();
        check_fixture(&site).await.unwrap();
        site.shutdown().await;
    }

    #[tokio::test]
    async fn test_probe_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!probe_runtime(&dir.path().join("cortex.sock")).await);
    }
}
