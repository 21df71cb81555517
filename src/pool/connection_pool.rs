//! Bounded LRU pool of upstream connections, one per destination

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::recency::RecencyTracker;
use super::stats::{PoolCounters, PoolStats};
use super::store::{ConnectionRecord, ConnectionStore};
use crate::config::PoolConfig;
use crate::connector::ConnectionFactory;
use crate::error::PoolError;
use crate::utils::duration_to_ms;

/// Diagnostic view of one resident connection
#[derive(Debug, Clone, Serialize)]
pub struct ResidentConnection {
    pub key: String,
    pub opened_at: DateTime<Utc>,
    pub idle_ms: u64,
}

/// Connection pool shared by many concurrent callers.
///
/// Lock order is always store, then recency. The recency mutex is only taken
/// while the store lock is held (shared or exclusive), so a recency update on
/// the hit path can never interleave with an eviction of the same key.
///
/// Both structures are only mutated between awaits, and releases run on
/// their own task, so cancelling `acquire` or `close_all` (for instance with
/// `tokio::time::timeout`) never strands a connection outside the pool
/// without closing it.
pub struct ConnectionPool<F: ConnectionFactory> {
    factory: Arc<F>,
    max_connections: usize,
    store: RwLock<ConnectionStore<F::Connection>>,
    recency: Mutex<RecencyTracker>,
    counters: Arc<PoolCounters>,
}

impl<F: ConnectionFactory + 'static> ConnectionPool<F> {
    pub fn new(config: &PoolConfig, factory: F) -> Result<Self, PoolError> {
        config.validate()?;

        debug!(
            "Creating connection pool (max_connections: {}, factory: {})",
            config.max_connections,
            factory.name()
        );
        Ok(Self {
            factory: Arc::new(factory),
            max_connections: config.max_connections,
            store: RwLock::new(ConnectionStore::with_capacity(config.max_connections)),
            recency: Mutex::new(RecencyTracker::new()),
            counters: Arc::new(PoolCounters::default()),
        })
    }

    /// Create a pool ready to be handed to many callers
    pub fn shared(config: &PoolConfig, factory: F) -> Result<Arc<Self>, PoolError> {
        Self::new(config, factory).map(Arc::new)
    }

    /// Return the resident connection for `key`, opening one on a miss.
    ///
    /// On a miss with the pool full, the least recently used connection is
    /// evicted and released. A failed open leaves the pool untouched.
    pub async fn acquire(&self, key: &str) -> Result<Arc<F::Connection>, PoolError> {
        if key.is_empty() {
            return Err(PoolError::EmptyKey);
        }

        {
            let store = self.store.read().await;
            if let Some(record) = store.get(key) {
                let handle = Arc::clone(record.handle());
                self.recency().touch(key);
                self.counters.record_hit();
                debug!("Pool HIT for key: {}", key);
                return Ok(handle);
            }
        }

        let mut store = self.store.write().await;

        // Another caller may have admitted the key while we waited
        if let Some(record) = store.get(key) {
            let handle = Arc::clone(record.handle());
            self.recency().touch(key);
            self.counters.record_hit();
            debug!("Pool HIT for key: {} (admitted concurrently)", key);
            return Ok(handle);
        }

        self.counters.record_miss();
        debug!("Pool MISS for key: {}", key);

        let connection = match self.factory.open(key).await {
            Ok(connection) => connection,
            Err(source) => {
                self.counters.record_open_failure();
                warn!("Failed to open connection for {}: {}", key, source);
                return Err(PoolError::ConnectionEstablishment {
                    key: key.to_string(),
                    source,
                });
            }
        };
        self.counters.record_open();
        let handle = Arc::new(connection);

        match self.admit(&mut store, key, Arc::clone(&handle)) {
            Ok(victim) => {
                info!(
                    "Opened connection for {} ({}/{} resident)",
                    key,
                    store.len(),
                    self.max_connections
                );
                if let Some(victim) = victim {
                    let victim_key = victim.key().to_string();
                    self.release(victim_key, victim.into_handle()).await;
                }
                Ok(handle)
            }
            Err(e) => {
                self.release(key.to_string(), handle).await;
                Err(e)
            }
        }
    }

    /// Release every resident connection and clear the pool. No-op when empty.
    pub async fn close_all(&self) {
        let mut store = self.store.write().await;
        let records = store.drain();
        self.recency().clear();

        if records.is_empty() {
            debug!("close_all called on an empty pool");
            return;
        }

        info!("Closing {} pooled connections", records.len());
        let releases: Vec<_> = records
            .into_iter()
            .map(|record| {
                let key = record.key().to_string();
                self.spawn_release(key, record.into_handle())
            })
            .collect();
        for joined in futures::future::join_all(releases).await {
            if let Err(e) = joined {
                warn!("Connection release task failed: {}", e);
            }
        }
    }

    /// Number of resident connections
    pub async fn size(&self) -> usize {
        self.store.read().await.len()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.read().await.contains(key)
    }

    /// Resident connections from most to least recently used
    pub async fn resident(&self) -> Vec<ResidentConnection> {
        let store = self.store.read().await;
        let recency = self.recency();

        recency
            .keys_by_recency()
            .into_iter()
            .filter_map(|key| {
                let record = store.get(&key)?;
                let idle_ms = recency
                    .get(&key)
                    .map(|entry| duration_to_ms(entry.last_accessed.elapsed()))
                    .unwrap_or_default();
                Some(ResidentConnection {
                    opened_at: record.opened_at(),
                    key,
                    idle_ms,
                })
            })
            .collect()
    }

    pub async fn stats(&self) -> PoolStats {
        let resident = self.size().await;
        self.counters.snapshot(resident, self.max_connections)
    }

    /// Insert a freshly opened connection, taking out the LRU victim when full.
    /// Returns the victim for the caller to release.
    fn admit(
        &self,
        store: &mut ConnectionStore<F::Connection>,
        key: &str,
        handle: Arc<F::Connection>,
    ) -> Result<Option<ConnectionRecord<F::Connection>>, PoolError> {
        let mut recency = self.recency();

        let victim = if store.len() >= self.max_connections {
            let victim_key = match recency.select_victim() {
                Some(victim_key) => victim_key.to_string(),
                None => {
                    error!(
                        "Pool reports {} resident connections but recency tracker is empty",
                        store.len()
                    );
                    return Err(PoolError::InvariantViolation(format!(
                        "eviction required with {} resident connections but no recency entries",
                        store.len()
                    )));
                }
            };

            let record = match store.remove(&victim_key) {
                Some(record) => record,
                None => {
                    error!("LRU victim {} is tracked but not resident", victim_key);
                    return Err(PoolError::InvariantViolation(format!(
                        "LRU victim {} is not resident",
                        victim_key
                    )));
                }
            };
            recency.remove(&victim_key);

            self.counters.record_eviction();
            info!("Evicting {} based on LRU", victim_key);
            Some(record)
        } else {
            None
        };

        store.insert(ConnectionRecord::new(key, handle));
        recency.touch(key);
        Ok(victim)
    }

    /// Close a connection on its own task so the release completes even if
    /// the caller stops waiting
    fn spawn_release(&self, key: String, handle: Arc<F::Connection>) -> JoinHandle<()> {
        let factory = Arc::clone(&self.factory);
        let counters = Arc::clone(&self.counters);
        tokio::spawn(async move {
            counters.record_close();
            if let Err(e) = factory.close(handle).await {
                counters.record_close_failure();
                warn!("Failed to release connection for {}: {}", key, e);
            }
        })
    }

    /// Best-effort release; failures are logged and never propagated
    async fn release(&self, key: String, handle: Arc<F::Connection>) {
        if let Err(e) = self.spawn_release(key, handle).await {
            warn!("Connection release task failed: {}", e);
        }
    }

    fn recency(&self) -> MutexGuard<'_, RecencyTracker> {
        self.recency.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::testing::MockFactory;
    use crate::error::ConnectionError;
    use futures::future::join_all;
    use std::collections::HashSet;
    use std::time::Duration;

    fn pool(max_connections: usize, factory: &MockFactory) -> Arc<ConnectionPool<MockFactory>> {
        ConnectionPool::shared(&PoolConfig::new(max_connections), factory.clone()).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = ConnectionPool::new(&PoolConfig::new(0), MockFactory::new());
        assert!(matches!(result, Err(PoolError::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let factory = MockFactory::new();
        let pool = pool(2, &factory);
        assert!(matches!(pool.acquire("").await, Err(PoolError::EmptyKey)));
        assert_eq!(factory.opens(), 0);
    }

    #[tokio::test]
    async fn test_hit_returns_same_handle() {
        let factory = MockFactory::new();
        let pool = pool(2, &factory);

        let first = pool.acquire("A").await.unwrap();
        let second = pool.acquire("A").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.key, "A");
        assert_eq!(factory.opens(), 1);

        let stats = pool.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.resident, 1);
    }

    #[tokio::test]
    async fn test_refreshed_key_survives_eviction() {
        let factory = MockFactory::new();
        let pool = pool(2, &factory);

        pool.acquire("A").await.unwrap();
        pool.acquire("B").await.unwrap();
        pool.acquire("A").await.unwrap();
        pool.acquire("C").await.unwrap();

        assert_eq!(pool.size().await, 2);
        assert!(pool.contains("A").await);
        assert!(!pool.contains("B").await);
        assert!(pool.contains("C").await);
        assert_eq!(factory.closed_keys(), vec!["B"]);
        assert_eq!(pool.stats().await.evictions, 1);
    }

    #[tokio::test]
    async fn test_evicts_global_least_recently_used() {
        let factory = MockFactory::new();
        let pool = pool(4, &factory);

        for key in ["k1", "k2", "k3", "k4"] {
            pool.acquire(key).await.unwrap();
        }
        // Refresh all but k3
        for key in ["k4", "k1", "k2"] {
            pool.acquire(key).await.unwrap();
        }
        pool.acquire("k5").await.unwrap();

        assert_eq!(factory.closed_keys(), vec!["k3"]);
        let resident: Vec<String> = pool.resident().await.into_iter().map(|r| r.key).collect();
        assert_eq!(resident, vec!["k5", "k2", "k1", "k4"]);
    }

    #[tokio::test]
    async fn test_failed_open_leaves_pool_untouched() {
        let factory = MockFactory::new();
        factory.fail_key("down");
        let pool = pool(2, &factory);

        pool.acquire("A").await.unwrap();
        pool.acquire("B").await.unwrap();

        let err = pool.acquire("down").await.unwrap_err();
        match err {
            PoolError::ConnectionEstablishment { key, source } => {
                assert_eq!(key, "down");
                assert!(matches!(source, ConnectionError::Refused(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // Nothing was evicted to make room for the failed open
        assert_eq!(pool.size().await, 2);
        assert!(pool.contains("A").await);
        assert!(pool.contains("B").await);
        assert_eq!(factory.closes(), 0);
        assert_eq!(pool.stats().await.open_failures, 1);
    }

    #[tokio::test]
    async fn test_timed_out_acquire_still_admits_and_releases() {
        let factory = MockFactory::new().with_close_delay(Duration::from_millis(200));
        let pool = pool(1, &factory);

        pool.acquire("A").await.unwrap();
        let result = tokio::time::timeout(Duration::from_millis(50), pool.acquire("B")).await;
        assert!(result.is_err());

        // B was admitted before the caller gave up; A's release keeps running
        assert_eq!(pool.size().await, 1);
        assert!(pool.contains("B").await);
        assert!(!pool.contains("A").await);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(factory.closed_keys(), vec!["A"]);

        pool.close_all().await;
        assert_eq!(factory.opens(), 2);
        assert_eq!(factory.closes(), 2);
    }

    #[tokio::test]
    async fn test_timed_out_close_all_still_releases_everything() {
        let factory = MockFactory::new().with_close_delay(Duration::from_millis(200));
        let pool = pool(3, &factory);

        for key in ["A", "B", "C"] {
            pool.acquire(key).await.unwrap();
        }
        let result = tokio::time::timeout(Duration::from_millis(50), pool.close_all()).await;
        assert!(result.is_err());
        assert_eq!(pool.size().await, 0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(factory.closes(), 3);
    }

    #[tokio::test]
    async fn test_untracked_victim_leaves_pool_unchanged() {
        let factory = MockFactory::new();
        let pool = pool(1, &factory);

        // A stale tracker entry older than every resident key
        {
            let _store = pool.store.read().await;
            pool.recency().touch("ghost");
        }
        pool.acquire("A").await.unwrap();

        let err = pool.acquire("B").await.unwrap_err();
        assert!(matches!(err, PoolError::InvariantViolation(_)));

        // Neither structure was touched; the connection opened for B was released
        assert!(pool.contains("A").await);
        assert_eq!(pool.size().await, 1);
        assert_eq!(pool.recency().len(), 2);
        assert_eq!(factory.closed_keys(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_empty_tracker_when_full_is_reported() {
        let factory = MockFactory::new();
        let pool = pool(1, &factory);

        pool.acquire("A").await.unwrap();
        {
            let _store = pool.store.write().await;
            pool.recency().clear();
        }

        let err = pool.acquire("B").await.unwrap_err();
        assert!(matches!(err, PoolError::InvariantViolation(_)));
        assert!(pool.contains("A").await);
        assert!(!pool.contains("B").await);
        assert_eq!(factory.closed_keys(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_release_failure_is_swallowed() {
        let factory = MockFactory::new();
        factory.fail_closes();
        let pool = pool(1, &factory);

        pool.acquire("A").await.unwrap();
        let b = pool.acquire("B").await.unwrap();

        assert_eq!(b.key, "B");
        assert_eq!(pool.size().await, 1);
        assert!(pool.contains("B").await);

        pool.close_all().await;
        let stats = pool.stats().await;
        assert_eq!(stats.close_failures, 2);
        assert_eq!(stats.resident, 0);
    }

    #[tokio::test]
    async fn test_close_all_closes_each_connection_once() {
        let factory = MockFactory::new();
        let pool = pool(3, &factory);

        for key in ["A", "B", "C"] {
            pool.acquire(key).await.unwrap();
        }
        pool.close_all().await;

        assert_eq!(pool.size().await, 0);
        assert!(pool.resident().await.is_empty());
        let mut closed = factory.closed_keys();
        closed.sort();
        assert_eq!(closed, vec!["A", "B", "C"]);

        // Second call is a no-op
        pool.close_all().await;
        assert_eq!(factory.closes(), 3);

        // The pool is usable again afterwards
        pool.acquire("A").await.unwrap();
        assert_eq!(pool.size().await, 1);
        assert_eq!(factory.opens(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_same_key_opens_once() {
        let factory = MockFactory::new().with_open_delay(Duration::from_millis(20));
        let pool = pool(4, &factory);

        let callers = (0..100).map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire("https://medium.com/").await })
        });
        let handles: Vec<_> = join_all(callers)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        assert_eq!(factory.opens(), 1);
        let ids: HashSet<u64> = handles.iter().map(|h| h.id).collect();
        assert_eq!(ids.len(), 1);
        assert_eq!(pool.size().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_hundred_callers_four_destinations() {
        let factory = MockFactory::new().with_open_delay(Duration::from_millis(5));
        let pool = pool(4, &factory);
        let keys = ["A", "B", "C", "D"];

        let callers = (0..100).map(|i| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                for j in 0..keys.len() {
                    let key = keys[(i + j) % keys.len()];
                    let handle = pool.acquire(key).await.unwrap();
                    assert_eq!(handle.key, key);
                    assert!(pool.size().await <= 4);
                }
            })
        });
        for joined in join_all(callers).await {
            joined.unwrap();
        }

        assert_eq!(pool.size().await, 4);
        assert_eq!(factory.opens(), 4);

        pool.close_all().await;
        assert_eq!(factory.closes(), 4);
        assert_eq!(pool.size().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_bound_holds_under_churn() {
        let factory = MockFactory::new();
        let pool = pool(3, &factory);

        let callers = (0..50).map(|i| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                for j in 0..20 {
                    let key = format!("dest-{}", (i * 7 + j) % 10);
                    let handle = pool.acquire(&key).await.unwrap();
                    assert_eq!(handle.key, key);
                    assert!(pool.size().await <= 3);
                }
            })
        });
        for joined in join_all(callers).await {
            joined.unwrap();
        }

        let stats = pool.stats().await;
        assert!(stats.resident <= 3);
        // Every opened connection is either still resident or was released
        assert_eq!(stats.opens as usize, stats.resident + factory.closes());

        // No connection was ever released twice
        let closed = factory.closed_ids();
        let unique: HashSet<u64> = closed.iter().copied().collect();
        assert_eq!(unique.len(), closed.len());

        pool.close_all().await;
        assert_eq!(factory.closes() as u64, stats.opens);
    }
}
