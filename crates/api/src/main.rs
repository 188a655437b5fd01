use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use api::{AppState, ServiceConfig};

const DEFAULT_LOG_FILTER: &str = "api=info,ingest=info,blob=info,graph=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServiceConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        chunk_size = config.chunking.chunk_size(),
        chunk_overlap = config.chunking.chunk_overlap(),
        blob = config.blob.is_configured(),
        graph = ?config.graph,
        "Loaded configuration"
    );

    let addr = config.bind_addr();
    let state = Arc::new(AppState::from_config(config).await?);
    let app = api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
