//! Rust Upstream Pool - a bounded, concurrent LRU cache of outbound connections
//!
//! One connection is kept per destination key. Callers share a
//! [`ConnectionPool`] through an `Arc`; when the pool is full, admitting a new
//! destination evicts the least recently used connection.

pub mod cli;
pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod pool;
pub mod utils;

// Re-export commonly used items
pub use config::{AppConfig, PoolConfig};
pub use connector::{ConnectionFactory, DirectConnector, TcpConnection, TcpConnector};
pub use error::{ConnectionError, PoolError};
pub use logging::{init_logger, init_logger_with_config, init_logger_with_level};
pub use pool::{ConnectionPool, PoolStats};

/// Runtime utilities for creating single-threaded vs multi-threaded Tokio runtimes
pub mod runtime {
    use crate::config::RuntimeConfig;
    use anyhow::{Context, Result};
    use tokio::runtime::{Builder, Runtime};

    /// Create a Tokio runtime based on the configuration
    pub fn create_runtime(config: &RuntimeConfig) -> Result<Runtime> {
        match config.mode.as_str() {
            "single_threaded" => {
                tracing::info!("🧵 Initializing single-threaded runtime");
                Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create single-threaded runtime")
            }
            "multi_threaded" => {
                let mut builder = Builder::new_multi_thread();
                builder.enable_all();

                match config.worker_threads {
                    Some(threads) if threads > 0 => {
                        tracing::info!("🧵 Initializing multi-threaded runtime with {} worker threads", threads);
                        builder.worker_threads(threads);
                    }
                    _ => {
                        tracing::info!("🧵 Initializing multi-threaded runtime with auto-detected CPU cores");
                    }
                }

                builder.build().context("Failed to create multi-threaded runtime")
            }
            mode => {
                tracing::warn!("⚠️  Unknown runtime mode '{}', defaulting to multi-threaded", mode);
                Builder::new_multi_thread()
                    .enable_all()
                    .build()
                    .context("Failed to create default multi-threaded runtime")
            }
        }
    }

    /// Execute an async function with the configured runtime
    pub fn run_with_runtime<F, T>(config: &RuntimeConfig, future: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let runtime = create_runtime(config)?;
        runtime.block_on(future)
    }

}
