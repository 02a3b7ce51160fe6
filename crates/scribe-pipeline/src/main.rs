//! Pipeline service binary.
//!
//! Wires the adapters, job queue, job service and orchestrator from the
//! environment, queues any source URLs given on the command line, and runs
//! background jobs until interrupted.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use scribe_adapters::{
    Adapters, DirectDownloader, GeminiAnalyzer, HttpTranscriber, InMemoryDocumentStore,
    R2Uploader,
};
use scribe_models::PipelineContext;
use scribe_pipeline::{PipelineConfig, PipelineOrchestrator};
use scribe_queue::JobQueue;
use scribe_worker::{JobService, WorkerConfig};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(3600);

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,scribe=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}

fn init_metrics() -> anyhow::Result<()> {
    let enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if !enabled {
        return Ok(());
    }

    let addr: SocketAddr = std::env::var("METRICS_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:9000".to_string())
        .parse()
        .context("Invalid METRICS_ADDR")?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

fn adapters_from_env() -> anyhow::Result<Adapters> {
    Ok(Adapters {
        downloader: Arc::new(DirectDownloader::from_env().context("downloader")?),
        cdn: Arc::new(R2Uploader::from_env().context("R2 uploader")?),
        transcriber: Arc::new(HttpTranscriber::from_env().context("transcriber")?),
        analyzer: Arc::new(GeminiAnalyzer::from_env().context("Gemini analyzer")?),
        documents: Arc::new(InMemoryDocumentStore::new()),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    init_tracing();
    info!("Starting scribe-pipeline");
    init_metrics()?;

    let adapters = adapters_from_env()?;
    let queue = Arc::new(JobQueue::from_env());
    let jobs = Arc::new(JobService::with_adapters(
        adapters.clone(),
        queue,
        WorkerConfig::from_env(),
    ));
    jobs.start();

    let orchestrator =
        PipelineOrchestrator::new(adapters, Arc::clone(&jobs), PipelineConfig::from_env());

    let health = orchestrator.get_health_status().await;
    for (name, dependency) in &health.dependencies {
        if let Some(message) = &dependency.message {
            warn!(dependency = %name, state = %dependency.state, "{}", message);
        }
    }
    info!(status = %health.status, "Initial health check");

    for url in std::env::args().skip(1) {
        match orchestrator.execute_background(PipelineContext::new(url.clone())) {
            Ok(execution) => info!(
                job_id = %execution.job_id,
                source_url = %url,
                estimated_duration_secs = execution.estimated_duration_secs,
                "Queued pipeline run"
            ),
            Err(e) => error!(source_url = %url, "Could not queue pipeline run: {}", e),
        }
    }

    let retention_hours = std::env::var("JOB_RETENTION_HOURS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(24);
    let cleanup_jobs = Arc::clone(&jobs);
    let cleanup = tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            cleanup_jobs.cleanup(retention_hours);
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C handler")?;
    info!("Received shutdown signal");

    cleanup.abort();
    orchestrator.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}
