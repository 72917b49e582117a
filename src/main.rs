use std::net::SocketAddr;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use codestrain_web::app::{self, AppState};
use codestrain_web::backend::BackendClient;
use codestrain_web::config::Config;
use codestrain_web::metrics;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("codestrain_web=debug,tower_http=debug")),
        )
        .init();

    let config = Config::load();
    metrics::register_metrics();

    let backend = BackendClient::new(&config.backend_url, config.backend_timeout)
        .context("Invalid backend URL")?;
    tracing::info!(backend = %backend.base_url(), "Using backend");

    if let Some(dir) = &config.static_dir {
        tracing::info!("Serving static files from {}", dir.display());
    }

    let app = app::router(AppState { backend }, config.static_dir.clone())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("codestrain web listening on {addr}");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
