//! Shared tracing/logging initialization.
//!
//! Sets up `tracing_subscriber` with an env-filter and optional JSON output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Build the default filter directive for the given level.
///
/// Covers the `tunnelsync` binary and both library crates.
pub fn default_filter(level: &str) -> String {
    format!("tunnelsync={level},tunnelsync_daemon={level},tunnelsync_core={level}")
}

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- default `RUST_LOG` value when the env-var is not set
///   (e.g. `"tunnelsync_daemon=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Both formats are written to stderr.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
    );
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_binary_and_crates() {
        let filter = default_filter("debug");
        assert_eq!(
            filter,
            "tunnelsync=debug,tunnelsync_daemon=debug,tunnelsync_core=debug"
        );
    }

    #[test]
    fn default_filter_parses() {
        let filter = tracing_subscriber::EnvFilter::try_new(default_filter("info")).unwrap();
        assert!(filter.to_string().contains("tunnelsync=info"));
    }
}
