use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use clap::Parser;
use iris_api::config::Config;
use iris_api::state::AppState;
use iris_api::handlers;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

#[derive(Parser)]
#[command(name = "iris-api")]
#[command(about = "Headless web fetch and extraction service")]
struct Args {
    #[arg(long, env = "IRIS_HOST")]
    host: Option<String>,

    #[arg(long, env = "IRIS_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;

    tracing::info!(
        bind_addr = %config.bind_addr(),
        max_concurrent_pages = config.max_concurrent_pages,
        "starting iris-api"
    );

    let addr: SocketAddr = config.bind_addr().parse()?;
    let max_content_length = config.max_content_length;
    let state = Arc::new(AppState::new(config).await?);

    let app = Router::new()
        .route("/fetch", post(handlers::fetch))
        .route("/batch", post(handlers::batch))
        .route("/health", get(handlers::get_health))
        .route("/cache/:fingerprint", delete(handlers::delete_cache_entry))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(max_content_length));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
