//! Serve command - run the translation proxy

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::args::ServeArgs;
use crate::config::AppConfig;
use crate::proxy;

pub async fn execute(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    let translator = proxy::upstream_translator(&config.translation);
    let app = proxy::router(
        translator,
        Duration::from_secs(config.server.request_timeout_secs.max(1)),
    );

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    tracing::info!(bind = %bind, "Translation proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Translation proxy stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
