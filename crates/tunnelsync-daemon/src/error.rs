//! Errors surfaced by a synchronization cycle.

use thiserror::Error;

/// Everything that can abort a cycle or the process bootstrap.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Process configuration (env file, required variables) could not be loaded.
    #[error("Configuration error: {0}")]
    ConfigLoad(String),

    /// The persisted URL record could not be read or written.
    #[error("State error: {0}")]
    State(#[from] tunnelsync_core::Error),

    /// Network-level failure talking to either endpoint.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The tunnel manager reported no active tunnel.
    #[error("No active tunnel reported by {endpoint}")]
    NoTunnel { endpoint: String },

    /// The remote API refused the credentials.
    #[error("Authentication failed ({status}): {body}")]
    Auth { status: u16, body: String },

    /// The remote API answered 200 without a token (strict token policy).
    #[error("Authentication succeeded but returned an empty token")]
    EmptyToken,

    /// The remote API rejected the URL update (strict response policy).
    #[error("URL registration rejected ({status}): {body}")]
    Registration { status: u16, body: String },
}
