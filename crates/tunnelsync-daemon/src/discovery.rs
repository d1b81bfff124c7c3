//! Tunnel discovery.
//!
//! Asks the local tunnel manager which tunnels are up and picks the public
//! URL of the first one. The manager answers `GET /api/tunnels` with:
//!
//! ```json
//! { "tunnels": [ { "public_url": "https://abc.ngrok.io", ... }, ... ] }
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::SyncError;

/// The tunnel selected for this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelInfo {
    pub public_url: String,
}

/// Source of the currently active public URL.
#[async_trait]
pub trait TunnelDiscovery: Send + Sync {
    async fn discover(&self) -> Result<TunnelInfo, SyncError>;
}

#[derive(Debug, Default, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct TunnelEntry {
    #[serde(default)]
    public_url: String,
}

/// Pick the first tunnel out of a tunnel-manager response body.
///
/// Bodies that do not parse are treated as an empty list.
pub(crate) fn select_first(body: &str, endpoint: &str) -> Result<TunnelInfo, SyncError> {
    let list: TunnelList = serde_json::from_str(body).unwrap_or_else(|e| {
        warn!(endpoint = %endpoint, error = %e, "Unparseable tunnel list, assuming no tunnels");
        TunnelList::default()
    });

    match list.tunnels.into_iter().next() {
        Some(entry) if !entry.public_url.is_empty() => Ok(TunnelInfo {
            public_url: entry.public_url,
        }),
        _ => Err(SyncError::NoTunnel {
            endpoint: endpoint.to_string(),
        }),
    }
}

/// [`TunnelDiscovery`] over the tunnel manager's local HTTP API.
#[derive(Debug, Clone)]
pub struct HttpDiscovery {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpDiscovery {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TunnelDiscovery for HttpDiscovery {
    async fn discover(&self) -> Result<TunnelInfo, SyncError> {
        // Status is not checked; only the body matters.
        let body = self.http.get(&self.endpoint).send().await?.text().await?;
        let tunnel = select_first(&body, &self.endpoint)?;
        info!(url = %tunnel.public_url, "Discovered public tunnel URL");
        Ok(tunnel)
    }
}
