//! `tunnelsync` Daemon
//!
//! Polls the local tunnel manager for the current public URL and, when it
//! changes, registers it with the remote control API. Runs one cycle at
//! startup and then one per interval until killed.

use clap::Parser;
use tracing::info;

use tunnelsync_core::JsonFileStore;
use tunnelsync_daemon::discovery::HttpDiscovery;
use tunnelsync_daemon::reconcile::Reconciler;
use tunnelsync_daemon::registrar::ApiRegistrar;
use tunnelsync_daemon::scheduler::{IntervalTicker, Scheduler};
use tunnelsync_daemon::settings::{self, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    settings::hydrate_env_file()?;
    let settings = Args::parse().into_settings()?;

    let log_filter = tunnelsync_core::tracing_init::default_filter(&settings.log_level);
    tunnelsync_core::tracing_init::init_tracing(&log_filter, settings.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        api_url = %settings.api_url,
        tunnels_url = %settings.tunnels_url,
        state_file = %settings.state_file.display(),
        interval_secs = settings.interval.as_secs(),
        on_error = ?settings.on_error,
        "Starting tunnelsync"
    );

    let http = tunnelsync_daemon::http::build_client(settings.http_timeout)?;
    let discovery = HttpDiscovery::new(http.clone(), settings.tunnels_url.clone());
    let registrar = ApiRegistrar::new(http, &settings.api_url)
        .with_token_policy(settings.token_policy)
        .with_response_policy(settings.response_policy);
    let store = JsonFileStore::new(settings.state_file.clone());
    let mut reconciler =
        Reconciler::new(discovery, registrar, store, settings.credentials.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let max_cycles = settings.once.then_some(1);
    let mut scheduler = Scheduler::new(IntervalTicker::new(settings.interval), settings.on_error)
        .with_max_cycles(max_cycles);
    let summary = scheduler.run(&mut reconciler, shutdown_rx).await?;

    info!(
        cycles = summary.cycles,
        registered = summary.registered,
        unchanged = summary.unchanged,
        failed = summary.failed,
        "tunnelsync stopped"
    );
    Ok(())
}

/// Resolve on Ctrl+C or (unix) SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    let sigterm_future = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<()>();

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        () = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }
}
