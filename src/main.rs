mod config;
mod error;
mod gateway;
mod gemini;
mod i18n;
mod image;
mod models;
mod pdf;
mod prompts;
mod routes;
mod workflow;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::gateway::GeminiGateway;
use crate::routes::{router, AppState};
use crate::workflow::WorkflowController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env();
    tracing::info!(
        text_model = %config.text_model,
        image_model = %config.image_model,
        api_key_configured = config.api_key.is_some(),
        "Gemini gateway configured"
    );

    let gateway = Arc::new(GeminiGateway::new(&config));
    let mut workflow = WorkflowController::new(gateway, config.default_language);
    if let Some(path) = &config.guide_font_path {
        match tokio::fs::read(path).await {
            Ok(bytes) => {
                tracing::info!("🔤 Guide font loaded from {}", path.display());
                workflow = workflow.with_guide_font(bytes.into());
            }
            Err(e) => tracing::warn!("⚠️ Could not read GUIDE_FONT_PATH {}: {}", path.display(), e),
        }
    }

    spawn_session_sweeper(workflow.clone(), config.session_idle_ttl);

    let app = router(AppState { workflow });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn spawn_session_sweeper(workflow: WorkflowController, ttl: chrono::Duration) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let purged = workflow.purge_idle(ttl);
            if purged > 0 {
                tracing::info!("🧹 Purged {} idle sessions", purged);
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
