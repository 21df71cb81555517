//! Compare pooled and unpooled connection counts under concurrent load

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{AppConfig, PoolConfig};
use crate::connector::{ConnectionFactory, DirectConnector, TcpConnector};
use crate::pool::{ConnectionPool, PoolStats};
use crate::utils::{destination_key, elapsed_ms, now};

#[derive(Debug, Args)]
pub struct BenchArgs {
    /// Destination URLs every caller requests
    #[arg(required = true, num_args = 1..)]
    pub urls: Vec<String>,

    /// Number of concurrent callers
    #[arg(long, default_value = "100")]
    pub callers: usize,

    /// Passes each caller makes over the URL list
    #[arg(long, default_value = "1")]
    pub rounds: usize,

    /// Override the configured pool bound
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Override the configured connect timeout in seconds
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// Bypass the pool and open one connection per request
    #[arg(long, default_value = "false")]
    pub direct: bool,

    /// Pool by origin (scheme://host:port) rather than by full URL
    #[arg(long, default_value = "false")]
    pub per_origin: bool,
}

/// Outcome of one bench run
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub callers: usize,
    pub destinations: usize,
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub connections_opened: usize,
    pub elapsed_ms: u64,
    pub pool: Option<PoolStats>,
}

impl BenchArgs {
    /// Destination keys in request order
    pub fn destinations(&self) -> Result<Vec<String>> {
        if !self.per_origin {
            return Ok(self.urls.clone());
        }
        self.urls
            .iter()
            .map(|url| destination_key(url).map_err(|e| anyhow!("Invalid URL '{}': {}", url, e)))
            .collect()
    }

    /// Run the bench against real TCP destinations
    pub async fn execute(&self, config: &AppConfig) -> Result<BenchReport> {
        if self.callers == 0 || self.rounds == 0 {
            return Err(anyhow!("callers and rounds must be greater than zero"));
        }

        let destinations = self.destinations()?;
        let timeout_secs = self
            .connect_timeout
            .unwrap_or(config.connector.connect_timeout_secs);
        let connector = TcpConnector::new(Duration::from_secs(timeout_secs));

        info!("📋 Bench Configuration:");
        info!("   Mode: {}", if self.direct { "direct" } else { "pooled" });
        info!("   Callers: {} x {} rounds", self.callers, self.rounds);
        info!("   Destinations: {}", destinations.len());
        info!("   Connect timeout: {}s", timeout_secs);

        if self.direct {
            Ok(run_direct(connector, destinations, self.callers, self.rounds).await)
        } else {
            let pool_config = PoolConfig::new(
                self.max_connections
                    .unwrap_or(config.pool.max_connections),
            );
            info!("   Max connections: {}", pool_config.max_connections);
            run_pooled(&pool_config, connector, destinations, self.callers, self.rounds).await
        }
    }
}

fn tally<E: std::fmt::Display>(outcomes: Vec<Result<(), E>>) -> (usize, usize) {
    let mut succeeded = 0;
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            Ok(()) => succeeded += 1,
            Err(e) => {
                failed += 1;
                debug!("Request failed: {}", e);
            }
        }
    }
    (succeeded, failed)
}

/// Every caller acquires every destination through one shared pool
pub async fn run_pooled<F>(
    pool_config: &PoolConfig,
    factory: F,
    destinations: Vec<String>,
    callers: usize,
    rounds: usize,
) -> Result<BenchReport>
where
    F: ConnectionFactory + 'static,
{
    let pool = ConnectionPool::shared(pool_config, factory)?;
    let destinations = Arc::new(destinations);
    let started_at = now();
    let start = Instant::now();

    let tasks = (0..callers).map(|_| {
        let pool = Arc::clone(&pool);
        let destinations = Arc::clone(&destinations);
        tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(destinations.len() * rounds);
            for _ in 0..rounds {
                for key in destinations.iter() {
                    outcomes.push(pool.acquire(key).await.map(|_| ()));
                }
            }
            outcomes
        })
    });

    let mut outcomes = Vec::new();
    for joined in join_all(tasks).await {
        match joined {
            Ok(results) => outcomes.extend(results),
            Err(e) => warn!("Bench caller panicked: {}", e),
        }
    }
    let elapsed = elapsed_ms(start);

    for resident in pool.resident().await {
        debug!("Resident: {} (idle {}ms)", resident.key, resident.idle_ms);
    }
    let stats = pool.stats().await;
    pool.close_all().await;

    let requests = outcomes.len();
    let (succeeded, failed) = tally(outcomes);
    info!(
        "✅ Pooled run: {} requests, {} connections opened, {} evictions ({}ms)",
        requests, stats.opens, stats.evictions, elapsed
    );

    Ok(BenchReport {
        mode: "pooled".to_string(),
        started_at,
        callers,
        destinations: destinations.len(),
        requests,
        succeeded,
        failed,
        connections_opened: stats.opens as usize,
        elapsed_ms: elapsed,
        pool: Some(stats),
    })
}

/// Every request opens and releases its own connection
pub async fn run_direct<F>(
    factory: F,
    destinations: Vec<String>,
    callers: usize,
    rounds: usize,
) -> BenchReport
where
    F: ConnectionFactory + 'static,
{
    let direct = Arc::new(DirectConnector::new(factory));
    let destinations = Arc::new(destinations);
    let started_at = now();
    let start = Instant::now();

    let tasks = (0..callers).map(|_| {
        let direct = Arc::clone(&direct);
        let destinations = Arc::clone(&destinations);
        tokio::spawn(async move {
            let mut outcomes = Vec::with_capacity(destinations.len() * rounds);
            for _ in 0..rounds {
                for key in destinations.iter() {
                    outcomes.push(direct.go(key).await);
                }
            }
            outcomes
        })
    });

    let mut outcomes = Vec::new();
    for joined in join_all(tasks).await {
        match joined {
            Ok(results) => outcomes.extend(results),
            Err(e) => warn!("Bench caller panicked: {}", e),
        }
    }
    let elapsed = elapsed_ms(start);

    let requests = outcomes.len();
    let (succeeded, failed) = tally(outcomes);
    info!(
        "✅ Direct run: {} requests, {} connections opened ({}ms)",
        requests,
        direct.connections_opened(),
        elapsed
    );

    BenchReport {
        mode: "direct".to_string(),
        started_at,
        callers,
        destinations: destinations.len(),
        requests,
        succeeded,
        failed,
        connections_opened: direct.connections_opened(),
        elapsed_ms: elapsed,
        pool: None,
    }
}
