//! Process settings.
//!
//! Resolved once at startup from (highest priority first):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. The dotenv file (`./.env` or `$TUNNELSYNC_ENV_FILE`)
//! 4. Built-in defaults
//!
//! The result is an immutable [`Settings`] value handed to the components.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::error::SyncError;
use crate::registrar::{ResponsePolicy, TokenPolicy};
use crate::scheduler::ErrorPolicy;

/// Default tunnel-manager endpoint listing active tunnels.
pub const DEFAULT_TUNNELS_URL: &str = "http://127.0.0.1:4040/api/tunnels";

/// Default location of the persisted URL record.
pub const DEFAULT_STATE_FILE: &str = "./config.json";

/// Default dotenv file read before argument parsing.
pub const DEFAULT_ENV_FILE: &str = "./.env";

/// Overrides [`DEFAULT_ENV_FILE`].
pub const ENV_FILE_VAR: &str = "TUNNELSYNC_ENV_FILE";

/// When set (to anything), no dotenv file is read.
pub const SKIP_DOTENV_VAR: &str = "TUNNELSYNC_SKIP_DOTENV";

#[derive(Parser, Debug)]
#[command(name = "tunnelsync")]
#[command(version, about = "Registers the current tunnel URL with a remote API")]
pub struct Args {
    /// Base URL of the remote control API
    #[arg(long, env = "API_URL")]
    pub api_url: String,

    /// Username for the remote API
    #[arg(long, env = "USERNAME_API")]
    pub username: String,

    /// Password for the remote API
    #[arg(long, env = "PASSWORD_API", hide_env_values = true)]
    pub password: String,

    /// Tunnel-manager endpoint listing active tunnels
    #[arg(long, default_value = DEFAULT_TUNNELS_URL, env = "TUNNELSYNC_TUNNELS_URL")]
    pub tunnels_url: String,

    /// File holding the last registered URL
    #[arg(long, default_value = DEFAULT_STATE_FILE, env = "TUNNELSYNC_STATE_FILE")]
    pub state_file: PathBuf,

    /// Seconds between synchronization cycles
    #[arg(
        long,
        default_value_t = 300,
        env = "TUNNELSYNC_INTERVAL_SECS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval_secs: u64,

    /// Timeout for each outbound HTTP request. Unset means no timeout.
    #[arg(long, env = "TUNNELSYNC_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,

    /// What to do when a cycle fails.
    #[arg(long, value_enum, default_value_t = ErrorPolicy::Terminate, env = "TUNNELSYNC_ON_ERROR")]
    pub on_error: ErrorPolicy,

    /// Whether an empty authentication token aborts the cycle.
    #[arg(long, value_enum, default_value_t = TokenPolicy::Lenient, env = "TUNNELSYNC_TOKEN_POLICY")]
    pub token_policy: TokenPolicy,

    /// Whether a non-success registration status aborts the cycle.
    #[arg(long, value_enum, default_value_t = ResponsePolicy::Lenient, env = "TUNNELSYNC_RESPONSE_POLICY")]
    pub response_policy: ResponsePolicy,

    /// Run a single cycle and exit.
    #[arg(long, env = "TUNNELSYNC_ONCE")]
    pub once: bool,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "TUNNELSYNC_LOG_LEVEL")]
    pub log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "TUNNELSYNC_LOG_JSON")]
    pub log_json: bool,
}

/// Remote API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fully resolved, immutable process settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Remote API base URL without a trailing slash.
    pub api_url: String,
    pub credentials: Credentials,
    pub tunnels_url: String,
    pub state_file: PathBuf,
    pub interval: Duration,
    pub http_timeout: Option<Duration>,
    pub on_error: ErrorPolicy,
    pub token_policy: TokenPolicy,
    pub response_policy: ResponsePolicy,
    pub once: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl Args {
    /// Validate and freeze the parsed arguments.
    pub fn into_settings(self) -> Result<Settings, SyncError> {
        let api_url = self.api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(SyncError::ConfigLoad("API_URL is empty".into()));
        }

        Ok(Settings {
            api_url,
            credentials: Credentials {
                username: self.username,
                password: self.password,
            },
            tunnels_url: self.tunnels_url,
            state_file: self.state_file,
            interval: Duration::from_secs(self.interval_secs),
            http_timeout: self.http_timeout_secs.map(Duration::from_secs),
            on_error: self.on_error,
            token_policy: self.token_policy,
            response_policy: self.response_policy,
            once: self.once,
            log_level: self.log_level,
            log_json: self.log_json,
        })
    }
}

/// Load the dotenv file into the process environment.
///
/// Runs before argument parsing so that `clap`'s `env` fallbacks see the
/// values. Variables already present in the environment are not overridden.
pub fn hydrate_env_file() -> Result<(), SyncError> {
    if std::env::var_os(SKIP_DOTENV_VAR).is_some() {
        return Ok(());
    }
    let path = std::env::var_os(ENV_FILE_VAR)
        .map_or_else(|| PathBuf::from(DEFAULT_ENV_FILE), PathBuf::from);
    load_env_file(&path)
}

/// Load a specific dotenv file. A missing or malformed file is an error.
pub fn load_env_file(path: &Path) -> Result<(), SyncError> {
    dotenvy::from_path(path)
        .map_err(|e| SyncError::ConfigLoad(format!("can't load {}: {e}", path.display())))
}
