// unm-gateway - resilient caching, rate limiting and source fallback for a music catalog API

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};
use unm_gateway::cache::CacheRegistry;
use unm_gateway::cli::Args;
use unm_gateway::config::AppConfig;
use unm_gateway::error::set_expose_details;
use unm_gateway::server::{create_router, AppState};
use unm_gateway::sources::{ProviderRegistry, SourceResolver};
use unm_gateway::utils::logging;

fn main() -> Result<()> {
    let args = Args::parse();

    // Phase 1: Load configuration
    let mut config = AppConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    // Phase 2: Initialize logging
    logging::init(&config.logging)?;
    info!("Starting unm-gateway v{}", env!("CARGO_PKG_VERSION"));
    set_expose_details(!config.server.is_production());

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("failed to build runtime")?
        .block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    // Phase 3: Cache, connected eagerly so health reflects the real state
    let registry = Arc::new(CacheRegistry::new(config.cache.clone()));
    let cache = registry.cache().await;
    if !cache.is_healthy() {
        warn!("Distributed cache unavailable, starting in degraded mode");
    }

    // Phase 4: Upstream sources
    let providers = ProviderRegistry::from_config(&config.sources)?;
    if providers.is_empty() {
        warn!("No upstream sources configured, every lookup will miss");
    }
    let resolver = SourceResolver::new(
        cache.clone(),
        providers,
        Duration::from_millis(config.sources.timeout_ms),
    );

    // Phase 5: Build and start HTTP server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = create_router(AppState::new(config, registry.clone(), cache, resolver));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Phase 6: Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    registry.shutdown().await;
    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
