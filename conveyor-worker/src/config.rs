//! Worker configuration
//!
//! Polling cadence, concurrency limits, engine tuning and the service
//! registry, all read from environment variables with defaults.

use anyhow::Context;
use conveyor_engine::{EngineConfig, ServiceRegistry};
use std::str::FromStr;
use std::time::Duration;

/// Largest accepted idle back-off growth factor
pub const MAX_BACKOFF_FACTOR: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct Config {
    /// Identity recorded as the owner of claimed items
    pub worker_id: String,

    /// Orchestrator base URL (e.g., "http://localhost:8080")
    pub orchestrator_url: String,

    /// Capability this worker polls for
    pub capability: String,

    /// Maximum pending items listed per poll
    pub poll_batch_size: usize,

    /// Idle back-off: starts at `poll_min_interval`, grows by
    /// `poll_backoff_factor` per empty poll, capped at `poll_max_interval`
    pub poll_min_interval: Duration,
    pub poll_max_interval: Duration,
    pub poll_backoff_factor: f64,

    /// Claimed items processed at once
    pub max_concurrent_items: usize,

    pub engine: EngineConfig,

    pub services: ServiceRegistry,

    /// How long shutdown waits for in-flight items before failing them
    pub shutdown_grace: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(worker_id: String, orchestrator_url: String) -> Self {
        Self {
            worker_id,
            orchestrator_url,
            capability: "default".to_string(),
            poll_batch_size: 10,
            poll_min_interval: Duration::from_secs(1),
            poll_max_interval: Duration::from_secs(8),
            poll_backoff_factor: 1.5,
            max_concurrent_items: 4,
            engine: EngineConfig::default(),
            services: ServiceRegistry::new(),
            shutdown_grace: Duration::from_secs(30),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// - WORKER_ID (default: generated)
    /// - ORCHESTRATOR_URL (default: http://localhost:8080)
    /// - WORKER_CAPABILITY (default: default)
    /// - POLL_BATCH_SIZE (default: 10)
    /// - POLL_MIN_INTERVAL_MS / POLL_MAX_INTERVAL_MS (default: 1000 / 8000)
    /// - POLL_BACKOFF_FACTOR (default: 1.5)
    /// - MAX_CONCURRENT_ITEMS (default: 4)
    /// - ENGINE_CHUNK_SIZE / ENGINE_MAX_WORKERS (default: 10 / 4)
    /// - STEP_TIMEOUT_MS (default: 30000)
    /// - STEP_RETRY_COUNT (default: 0)
    /// - SERVICE_REGISTRY, as `name=url,name=url` (default: empty)
    /// - SHUTDOWN_GRACE_SECS (default: 30)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let services = match std::env::var("SERVICE_REGISTRY") {
            Ok(raw) => ServiceRegistry::parse(&raw).context("Invalid SERVICE_REGISTRY")?,
            Err(_) => ServiceRegistry::new(),
        };

        Ok(Self {
            worker_id: std::env::var("WORKER_ID").unwrap_or(defaults.worker_id),
            orchestrator_url: std::env::var("ORCHESTRATOR_URL")
                .unwrap_or(defaults.orchestrator_url),
            capability: std::env::var("WORKER_CAPABILITY").unwrap_or(defaults.capability),
            poll_batch_size: env_or("POLL_BATCH_SIZE", defaults.poll_batch_size),
            poll_min_interval: env_millis_or("POLL_MIN_INTERVAL_MS", defaults.poll_min_interval),
            poll_max_interval: env_millis_or("POLL_MAX_INTERVAL_MS", defaults.poll_max_interval),
            poll_backoff_factor: env_or("POLL_BACKOFF_FACTOR", defaults.poll_backoff_factor),
            max_concurrent_items: env_or("MAX_CONCURRENT_ITEMS", defaults.max_concurrent_items),
            engine: EngineConfig {
                chunk_size: env_or("ENGINE_CHUNK_SIZE", defaults.engine.chunk_size),
                max_workers: env_or("ENGINE_MAX_WORKERS", defaults.engine.max_workers),
                default_timeout: env_millis_or("STEP_TIMEOUT_MS", defaults.engine.default_timeout),
                default_retry_count: env_or("STEP_RETRY_COUNT", defaults.engine.default_retry_count),
            },
            services,
            shutdown_grace: std::env::var("SHUTDOWN_GRACE_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.worker_id.is_empty() {
            anyhow::bail!("worker_id cannot be empty");
        }

        if !self.orchestrator_url.starts_with("http://")
            && !self.orchestrator_url.starts_with("https://")
        {
            anyhow::bail!("orchestrator_url must start with http:// or https://");
        }

        if self.capability.trim().is_empty() {
            anyhow::bail!("capability cannot be empty");
        }

        if self.poll_batch_size == 0 {
            anyhow::bail!("poll_batch_size must be greater than 0");
        }

        if self.poll_min_interval.is_zero() {
            anyhow::bail!("poll_min_interval must be greater than 0");
        }

        if self.poll_max_interval < self.poll_min_interval {
            anyhow::bail!("poll_max_interval must not be lower than poll_min_interval");
        }

        if !self.poll_backoff_factor.is_finite()
            || !(1.0..=MAX_BACKOFF_FACTOR).contains(&self.poll_backoff_factor)
        {
            anyhow::bail!(
                "poll_backoff_factor must be between 1.0 and {}",
                MAX_BACKOFF_FACTOR
            );
        }

        if self.max_concurrent_items == 0 {
            anyhow::bail!("max_concurrent_items must be greater than 0");
        }

        self.engine.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            format!("worker-{}", uuid::Uuid::new_v4()),
            "http://localhost:8080".to_string(),
        )
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

fn env_millis_or(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
