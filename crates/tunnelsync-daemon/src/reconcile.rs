//! One synchronization cycle.
//!
//! discover -> load persisted URL -> compare -> (changed) save -> authenticate
//! -> register. The new URL is persisted before the remote API is contacted,
//! so a failed registration is not retried until the tunnel URL changes
//! again.

use async_trait::async_trait;
use tracing::info;
use tunnelsync_core::UrlStore;

use crate::discovery::TunnelDiscovery;
use crate::error::SyncError;
use crate::registrar::Registrar;
use crate::scheduler::Job;
use crate::settings::Credentials;

/// Result of a successful cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Discovered URL matches the persisted one; nothing was sent.
    Unchanged { url: String },
    /// The URL changed and was pushed to the remote API.
    Registered { url: String, response: String },
}

/// Ties discovery, the state store and the registrar together.
#[derive(Debug)]
pub struct Reconciler<D, R, S> {
    discovery: D,
    registrar: R,
    store: S,
    credentials: Credentials,
}

impl<D, R, S> Reconciler<D, R, S>
where
    D: TunnelDiscovery,
    R: Registrar,
    S: UrlStore + Send + Sync,
{
    pub const fn new(discovery: D, registrar: R, store: S, credentials: Credentials) -> Self {
        Self {
            discovery,
            registrar,
            store,
            credentials,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Run a single cycle to completion.
    pub async fn run_once(&self) -> Result<CycleOutcome, SyncError> {
        let tunnel = self.discovery.discover().await?;
        let persisted = self.store.load()?;

        if persisted.url == tunnel.public_url {
            info!(url = %tunnel.public_url, "Tunnel URL unchanged");
            return Ok(CycleOutcome::Unchanged {
                url: tunnel.public_url,
            });
        }

        self.store.save(&tunnel.public_url)?;
        info!(
            previous = %persisted.url,
            url = %tunnel.public_url,
            "Tunnel URL changed, persisted"
        );

        let token = self.registrar.authenticate(&self.credentials).await?;
        let response = self
            .registrar
            .register_url(&token, &tunnel.public_url)
            .await?;
        info!(url = %tunnel.public_url, "Tunnel URL registered");

        Ok(CycleOutcome::Registered {
            url: tunnel.public_url,
            response,
        })
    }
}

#[async_trait]
impl<D, R, S> Job for Reconciler<D, R, S>
where
    D: TunnelDiscovery,
    R: Registrar,
    S: UrlStore + Send + Sync,
{
    async fn run_cycle(&mut self) -> Result<CycleOutcome, SyncError> {
        self.run_once().await
    }
}
