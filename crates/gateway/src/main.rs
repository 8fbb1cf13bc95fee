//! ContentForge API Gateway
//!
//! HTTP surface over the generation queue, pipeline runs and the publish
//! gate. Handles:
//! - Tenant scoping via the `X-Tenant-ID` header
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod app;
mod handlers;
mod middleware;

use anyhow::Context;
use contentforge_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS},
    providers::{create_generator, create_humanizer},
    publish::create_publish_target,
    store::ContentStore,
    telemetry,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crate::app::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.observability)?;

    info!("Starting ContentForge API Gateway v{}", contentforge_common::VERSION);

    let config = Arc::new(config);

    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }
    metrics::register_metrics();

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        db.migrate(&config.database.migrations_dir).await?;
    }
    let store: Arc<dyn ContentStore> = Arc::new(Repository::new(db.clone()));

    let generator = create_generator(&config.generation)?;
    let humanizer = create_humanizer(&config.humanization)?;
    let target = create_publish_target(&config.publishing)?;

    let state = AppState::new(
        config.clone(),
        store,
        Some(db),
        generator,
        humanizer,
        target,
    );
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    telemetry::shutdown_tracing();
    Ok(())
}

/// Serve `/metrics` on its own port
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", metrics::METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("stage_duration_seconds".to_string()),
            GENERATION_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_provider_duration_seconds", metrics::METRICS_PREFIX)),
            GENERATION_BUCKETS,
        )?
        .install()
        .context("failed to install Prometheus exporter")?;

    info!(port, "Metrics exporter listening");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
