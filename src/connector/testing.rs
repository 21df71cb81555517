//! Counting factory for pool tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::ConnectionFactory;
use crate::error::ConnectionError;

#[derive(Debug)]
pub(crate) struct MockConnection {
    pub id: u64,
    pub key: String,
}

#[derive(Default)]
struct MockState {
    next_id: AtomicU64,
    opens: AtomicUsize,
    closes: AtomicUsize,
    fail_close: AtomicBool,
    open_delay: Mutex<Option<Duration>>,
    close_delay: Mutex<Option<Duration>>,
    failing: Mutex<HashSet<String>>,
    closed_keys: Mutex<Vec<String>>,
    closed_ids: Mutex<Vec<u64>>,
}

#[derive(Clone, Default)]
pub(crate) struct MockFactory {
    state: Arc<MockState>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every open sleep, widening race windows
    pub fn with_open_delay(self, delay: Duration) -> Self {
        *self.state.open_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Make every close sleep before it completes
    pub fn with_close_delay(self, delay: Duration) -> Self {
        *self.state.close_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn fail_key(&self, key: &str) {
        self.state.failing.lock().unwrap().insert(key.to_string());
    }

    pub fn fail_closes(&self) {
        self.state.fail_close.store(true, Ordering::SeqCst);
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn closed_keys(&self) -> Vec<String> {
        self.state.closed_keys.lock().unwrap().clone()
    }

    pub fn closed_ids(&self) -> Vec<u64> {
        self.state.closed_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    type Connection = MockConnection;

    async fn open(&self, key: &str) -> Result<MockConnection, ConnectionError> {
        let delay = *self.state.open_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.state.failing.lock().unwrap().contains(key) {
            return Err(ConnectionError::Refused(key.to_string()));
        }

        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id,
            key: key.to_string(),
        })
    }

    async fn close(&self, connection: Arc<MockConnection>) -> Result<(), ConnectionError> {
        let delay = *self.state.close_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.state.closed_keys.lock().unwrap().push(connection.key.clone());
        self.state.closed_ids.lock().unwrap().push(connection.id);

        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(ConnectionError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "socket already torn down",
            )));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
