//! Unpooled baseline: one connection per request

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::ConnectionFactory;
use crate::error::ConnectionError;

/// Opens a fresh connection for every request and releases it straight away
pub struct DirectConnector<F: ConnectionFactory> {
    factory: F,
    opened: AtomicUsize,
}

impl<F: ConnectionFactory> DirectConnector<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            opened: AtomicUsize::new(0),
        }
    }

    /// Open and release one connection to `key`
    pub async fn go(&self, key: &str) -> Result<(), ConnectionError> {
        let connection = self.factory.open(key).await?;
        let total = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Direct connection opened to {} (total opened: {})", key, total);

        if let Err(e) = self.factory.close(Arc::new(connection)).await {
            warn!("Failed to release direct connection to {}: {}", key, e);
        }
        Ok(())
    }

    /// Total number of connections opened so far
    pub fn connections_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}
