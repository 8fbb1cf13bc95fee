//! ContentForge Worker
//!
//! Background processing for the generation queue:
//! 1. Claims pending queue items (`concurrent_workers` loops)
//! 2. Resolves the content idea or article to generate
//! 3. Drives the pipeline run to completion
//! 4. Sweeps timed-out, scheduled and failed items and runs auto-publish

mod processor;
mod runner;
mod sweeper;

use crate::processor::GenerationProcessor;
use crate::sweeper::Sweeper;
use anyhow::Context;
use contentforge_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics as app_metrics,
    pipeline::{PipelineOrchestrator, PipelineSettings},
    providers::{create_generator, create_humanizer},
    publish::{create_publish_target, Publisher},
    queue::{QueueService, QueueSettings},
    store::ContentStore,
    telemetry, VERSION,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{signal, sync::watch, task::JoinSet};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.observability)?;

    info!("Starting ContentForge Worker v{}", VERSION);

    let metrics_port = config.observability.metrics_port;
    if metrics_port != 0 {
        PrometheusBuilder::new()
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], metrics_port)))
            .set_buckets(app_metrics::GENERATION_BUCKETS)?
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(port = metrics_port, "Metrics exporter listening");
    }
    app_metrics::register_metrics();

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store: Arc<dyn ContentStore> = Arc::new(Repository::new(db));

    let generator = create_generator(&config.generation)?;
    let humanizer = create_humanizer(&config.humanization)?;
    let target = create_publish_target(&config.publishing)?;

    let queue = QueueService::new(store.clone(), QueueSettings::from(&config.queue));
    let orchestrator = PipelineOrchestrator::new(
        store.clone(),
        generator,
        humanizer,
        PipelineSettings::from(&config.generation),
    );
    let processor = GenerationProcessor::new(store.clone(), queue.clone(), orchestrator);
    let sweeper = Sweeper::new(queue, Publisher::new(store, target));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let workers = config.queue.concurrent_workers.max(1) as usize;
    for worker_id in 0..workers {
        tasks.spawn(runner::claim_loop(
            worker_id,
            processor.clone(),
            config.queue.poll_interval(),
            shutdown_rx.clone(),
        ));
    }
    tasks.spawn(runner::sweep_loop(sweeper, config.queue.sweep_interval(), shutdown_rx));

    info!(workers, "Worker ready, polling queue...");

    shutdown_signal().await;
    if shutdown_tx.send(true).is_err() {
        error!("All worker loops exited before shutdown");
    }

    let drain = async {
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Worker task panicked");
            }
        }
    };
    if tokio::time::timeout(config.shutdown_timeout(), drain).await.is_err() {
        error!("Timed out waiting for in-flight items, aborting");
    }

    info!("Worker shutting down");
    telemetry::shutdown_tracing();
    Ok(())
}

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
        _ = ctrl_c => info!("Shutdown signal received"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
