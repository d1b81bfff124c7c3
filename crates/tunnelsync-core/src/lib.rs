//! `tunnelsync` Core Library
//!
//! Shared functionality for the tunnel URL synchronizer:
//! - Persisted record of the last registered public URL
//! - Common error types
//! - Tracing subscriber setup

pub mod error;
pub mod state;
pub mod tracing_init;

pub use error::{Error, Result};
pub use state::{JsonFileStore, PersistedConfig, UrlStore};
