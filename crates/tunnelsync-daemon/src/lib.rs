//! tunnelsync Daemon Library
//!
//! Keeps a remote control API pointed at the current public URL of a local
//! tunnel:
//! - Tunnel discovery through the local tunnel-manager API
//! - Authentication and URL registration against the remote API
//! - Reconciliation of the discovered URL against the persisted one
//! - Fixed-interval scheduling with a configurable error policy

pub mod discovery;
pub mod error;
pub mod http;
pub mod reconcile;
pub mod registrar;
pub mod scheduler;
pub mod settings;

pub use error::SyncError;
