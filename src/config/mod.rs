//! Configuration for the pool, its connection factory and the runtime

pub mod settings;

pub use settings::{AppConfig, ConnectorConfig, PoolConfig, RuntimeConfig};
