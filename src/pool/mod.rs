//! Bounded, concurrent LRU cache of upstream connections

pub mod connection_pool;
pub mod recency;
pub mod stats;
pub mod store;

pub use connection_pool::{ConnectionPool, ResidentConnection};
pub use recency::{RecencyEntry, RecencyTracker};
pub use stats::PoolStats;
pub use store::{ConnectionRecord, ConnectionStore};
