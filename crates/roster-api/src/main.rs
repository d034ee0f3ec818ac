//! # roster-api: Binary Entry Point
//!
//! Parses configuration, opens the profile store and serves the API until
//! Ctrl-C.

use anyhow::Context;
use clap::Parser;
use roster_api::config::{AppConfig, LogFormat};
use roster_api::state::AppState;
use roster_schema::SchemaKind;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();
    init_tracing(config.log_format);

    config.validate().context("invalid configuration")?;
    tracing::debug!(?config, "configuration loaded");

    // Schemas are read per request, so a broken one is reported but not fatal.
    let validator = config.schema_validator();
    for kind in [SchemaKind::Create, SchemaKind::Update] {
        match validator.check(kind) {
            Ok(()) => tracing::info!(
                %kind,
                path = %validator.schema_path(kind).display(),
                "schema loaded"
            ),
            Err(err) => tracing::warn!(%kind, error = %err, "schema failed pre-flight check"),
        }
    }

    let store = roster_api::store::connect(&config)
        .await
        .context("failed to open profile store")?;
    let backend = store.backend();

    let state = AppState::new(store, validator).with_http(config.http_settings());
    let app = roster_api::app(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, backend, "Roster API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Roster API stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
