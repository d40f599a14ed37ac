//! Conveyor Worker
//!
//! A stateless worker that claims pending work items of one capability and
//! runs their pipeline templates against remote services.
//!
//! Architecture:
//! - Configuration: settings from environment variables with defaults
//! - Repositories: the work-item and template stores, over the orchestrator API
//! - Services: capability-tagged processors wrapping the execution engine
//! - Scheduler: polling, claiming, write-back and graceful shutdown

mod config;
mod repository;
mod scheduler;
mod service;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::repository::{
    HttpTemplateRepository, HttpWorkItemRepository, TemplateRepository, WorkItemRepository,
};
use crate::scheduler::ItemPoller;
use crate::service::{PipelineProcessor, ProcessorRegistry};
use conveyor_client::OrchestratorClient;
use conveyor_engine::{HttpServiceClient, PipelineEngine};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor_worker=info,conveyor_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Conveyor Worker");

    let config = load_config()?;
    info!(
        "Loaded configuration: worker_id={}, capability={}, orchestrator_url={}",
        config.worker_id, config.capability, config.orchestrator_url
    );

    let client = Arc::new(OrchestratorClient::new(config.orchestrator_url.clone()));

    info!("Waiting for orchestrator");
    wait_for_orchestrator(&client).await?;
    info!("Orchestrator is reachable");

    if config.services.is_empty() {
        warn!("SERVICE_REGISTRY is empty, every step will fail with SERVICE_NOT_FOUND");
    }
    for name in config.services.names() {
        info!("  - {} -> {}", name, config.services.resolve(name).unwrap_or_default());
    }

    let http = reqwest::Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .context("Failed to build HTTP client")?;

    let engine = Arc::new(PipelineEngine::new(
        Arc::new(config.services.clone()),
        Arc::new(HttpServiceClient::with_client(http)),
        config.engine.clone(),
    ));

    let items: Arc<dyn WorkItemRepository> =
        Arc::new(HttpWorkItemRepository::new(Arc::clone(&client)));
    let templates: Arc<dyn TemplateRepository> = Arc::new(HttpTemplateRepository::new(client));

    let processors = ProcessorRegistry::new().with_processor(
        config.capability.clone(),
        Arc::new(PipelineProcessor::new(templates, engine)),
    );

    info!("Processors registered for: {}", processors.capabilities().join(", "));
    info!("Worker initialized successfully");

    let poller = ItemPoller::new(config, items, Arc::new(processors));
    if let Err(e) = poller.run(shutdown_signal()).await {
        error!("Poller error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

fn load_config() -> Result<Config> {
    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;
    Ok(config)
}

/// Probe the orchestrator's health endpoint with exponential backoff
///
/// The orchestrator may not be ready yet when the worker starts (common in
/// container environments).
async fn wait_for_orchestrator(client: &OrchestratorClient) -> Result<()> {
    const MAX_RETRIES: u32 = 10;
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    loop {
        attempt += 1;

        match client.health().await {
            Ok(()) => {
                if attempt > 1 {
                    info!("Orchestrator reachable after {} attempt(s)", attempt);
                }
                return Ok(());
            }
            Err(e) => {
                if attempt >= MAX_RETRIES {
                    error!("Orchestrator unreachable after {} attempts", MAX_RETRIES);
                    return Err(anyhow::anyhow!("Orchestrator is not reachable: {}", e));
                }

                warn!(
                    "Orchestrator not ready (attempt {}/{}): {}",
                    attempt, MAX_RETRIES, e
                );
                warn!("Retrying in {} ms...", delay_ms);

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
            }
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
