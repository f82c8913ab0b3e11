use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mersul_client::InfoferOrigin;
use mersul_core::{KnowledgeStore, ScrapeService, ServiceConfig};
use mersul_server::config::ServerConfig;
use mersul_server::routes;
use mersul_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mersul=info".parse()?))
        .with_target(false)
        .init();

    let service_config = ServiceConfig::from_env()?;
    let server_config = ServerConfig::from_env()?;

    let store = KnowledgeStore::open(service_config.db_dir.clone())?;
    let origin = InfoferOrigin::from_env()?;
    let service = ScrapeService::new(origin, store, &service_config);

    let state = Arc::new(AppState {
        service,
        public_url: server_config.public_url,
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", server_config.port);
    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for CTRL+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
