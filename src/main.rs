//! feedsift — Binary Entrypoint
//! Wires the file store, the GitHub feed and the notification sinks
//! together, then runs the poll scheduler until SIGINT/SIGTERM.
//!
//! See `README.md` for quickstart and configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedsift::config::Config;
use feedsift::feed::GitHubFeed;
use feedsift::notify::{ConsoleNotifier, EmailNotifier, NotifierMux, WebhookNotifier};
use feedsift::poller::Poller;
use feedsift::store::FileStore;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

/// Installs handlers for SIGTERM and SIGINT; the returned token cancels
/// when either arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => info!("received SIGINT (Ctrl+C), shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, shutting down");
        }

        token_clone.cancel();
    });

    token
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env();

    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing the Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let store = Arc::new(
        FileStore::open(&config.accounts_path, &config.state_path)
            .await
            .context("opening the account store")?,
    );
    let feed = Arc::new(GitHubFeed::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
    )?);

    let mut sinks = NotifierMux::new();
    sinks.push(Box::new(ConsoleNotifier::stdout()));
    sinks.push(Box::new(WebhookNotifier::from_env()));
    if let Some(email) = EmailNotifier::from_env()? {
        sinks.push(Box::new(email));
    }
    info!(sinks = sinks.len(), "notification sinks ready");

    let cancel = install_signal_handler();
    let poller = Poller::new(store, feed, Arc::new(sinks), config.clone(), cancel);

    info!(
        interval_secs = config.tick_interval.as_secs(),
        accounts = %config.accounts_path.display(),
        "poller starting"
    );
    poller.run(config.tick_interval).await;
    info!("poller exited");
    Ok(())
}
