//! Pool configuration settings

use crate::error::PoolError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the pool and its tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log level configuration
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Connection pool configuration
    #[serde(default)]
    pub pool: PoolConfig,

    /// Connection factory configuration
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Runtime configuration
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Bound on resident connections, one per destination
    pub max_connections: usize,
}

/// Connection factory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Runtime mode: "single_threaded" or "multi_threaded"
    pub mode: String,

    /// Number of worker threads for multi-threaded mode (None = auto-detect CPU cores)
    pub worker_threads: Option<usize>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            pool: PoolConfig::default(),
            connector: ConnectorConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 100,
        }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: "multi_threaded".to_string(),
            worker_threads: None,
        }
    }
}

impl PoolConfig {
    pub fn new(max_connections: usize) -> Self {
        Self { max_connections }
    }

    /// Reject configurations the pool cannot honour
    pub fn validate(&self) -> std::result::Result<(), PoolError> {
        if self.max_connections == 0 {
            return Err(PoolError::Config(
                "max_connections must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load configuration from an optional YAML file with environment variable overrides.
    /// A missing file falls back to defaults.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_yaml_file(path)?,
            Some(path) => {
                return Err(anyhow::anyhow!(
                    "Config file '{}' not found",
                    path.display()
                ))
            }
            None if Path::new("pool.yml").exists() => Self::from_yaml_file("pool.yml")?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Override settings from environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        if let Ok(max) = std::env::var("POOL_MAX_CONNECTIONS") {
            if let Ok(max) = max.parse() {
                self.pool.max_connections = max;
            }
        }

        if let Ok(timeout) = std::env::var("POOL_CONNECT_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                self.connector.connect_timeout_secs = timeout;
            }
        }

        if let Ok(threads) = std::env::var("POOL_WORKER_THREADS") {
            if let Ok(threads) = threads.parse() {
                self.runtime.worker_threads = Some(threads);
            }
        }
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.pool.validate()?;

        if self.connector.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("connect_timeout_secs must be greater than zero"));
        }

        match self.runtime.mode.as_str() {
            "single_threaded" | "multi_threaded" => Ok(()),
            mode => Err(anyhow::anyhow!(
                "Invalid runtime mode '{}'. Must be 'single_threaded' or 'multi_threaded'",
                mode
            )),
        }
    }
}
