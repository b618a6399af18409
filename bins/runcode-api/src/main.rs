mod handlers;
mod metrics;
mod routes;

use anyhow::{Context, Result};
use runcode_common::config::ServiceConfig;
use runcode_engine::config::LanguageConfigManager;
use runcode_engine::TestRunner;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub runner: TestRunner,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServiceConfig::from_env();
    init_tracing(config.json_logs);

    info!("Run-code API booting...");

    let manager = LanguageConfigManager::load_or_builtin(&config.languages_path)?;
    info!(languages = ?manager.list_languages(), "Language configuration loaded");

    let state = Arc::new(AppState {
        runner: TestRunner::new(manager),
    });

    let app = routes::routes(config.max_body_bytes).with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);
    info!("Ready to grade submissions");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Run-code API stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
