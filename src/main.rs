//! SysEleven quota exporter.
//!
//! Polls the SysEleven Stack quota API for one project and republishes
//! quota and current usage as Prometheus gauges on `/metrics`.
//!
//! Pipeline:
//!   Keystone token → quota + current usage (v1 or v3)
//!        ↓ normalize into one metric namespace
//!   generation swap in the registry
//!        ↓
//!   scrapes read the latest complete generation

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

mod api;
mod auth;
mod config;
mod error;
mod metrics;
mod normalize;
mod poller;
mod server;

use config::{Args, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("📊 SysEleven exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(args).context("Invalid configuration")?;

    info!(
        project = %config.project_id,
        api_version = config.api_version.as_str(),
        auth_mode = ?config.auth_mode,
        interval_secs = config.interval.as_secs(),
        listen = %config.listen_address,
        "Configuration loaded"
    );

    // ── Metrics Registry ────────────────────────────────────────────
    let registry = prometheus::Registry::new();
    let metrics = Arc::new(metrics::QuotaMetrics::new().context("Failed to create metrics")?);
    metrics
        .register(&registry)
        .context("Failed to register metrics")?;

    // ── Upstream Clients ────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .user_agent(concat!("syseleven-exporter/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let keystone = auth::KeystoneAuth::new(
        http.clone(),
        config.auth_url.clone(),
        config.project_id.clone(),
        config.credentials.clone(),
        config.auth_mode,
    );
    let api = api::client::ApiClient::new(http, config.api_url.clone());

    // ── Shutdown Signal ─────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        tokio::spawn(async move {
            shutdown_signal().await;
            info!("Shutdown requested");
            shutdown_tx.send_replace(true);
        });
    }

    // ── Scrape Endpoint ─────────────────────────────────────────────
    let listener = TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_address))?;
    let server = tokio::spawn(server::serve(listener, registry, shutdown_rx.clone()));

    // ── Poll Driver ─────────────────────────────────────────────────
    let driver = poller::PollDriver::new(
        Arc::new(keystone),
        Arc::new(api),
        Arc::clone(&metrics),
        poller::PollSettings::from_config(&config),
    );
    let outcome = driver.run(shutdown_rx).await;

    // The poller only returns on shutdown or an exhausted retry budget;
    // either way the server goes down with it.
    shutdown_tx.send_replace(true);
    server
        .await
        .context("Metrics server task panicked")?
        .context("Metrics server failed")?;

    if let Err(e) = outcome {
        error!("Poller gave up: {}", e);
        return Err(e).context("Quota poller stopped after repeated failures");
    }

    info!("Exporter stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "syseleven_exporter=info".into());

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

/// Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
