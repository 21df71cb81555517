//! TCP connection factory

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::debug;

use super::ConnectionFactory;
use crate::config::ConnectorConfig;
use crate::error::ConnectionError;
use crate::utils::{now, resolve_target};

/// An open TCP connection to a destination
#[derive(Debug)]
pub struct TcpConnection {
    key: String,
    peer_addr: SocketAddr,
    opened_at: DateTime<Utc>,
    stream: Mutex<TcpStream>,
}

impl TcpConnection {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// The stream is shared by every caller holding this handle
    pub fn stream(&self) -> &Mutex<TcpStream> {
        &self.stream
    }
}

/// Dials destination keys (URLs) over plain TCP
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
}

impl TcpConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn from_config(config: &ConnectorConfig) -> Self {
        Self::new(Duration::from_secs(config.connect_timeout_secs))
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::from_config(&ConnectorConfig::default())
    }
}

#[async_trait]
impl ConnectionFactory for TcpConnector {
    type Connection = TcpConnection;

    async fn open(&self, key: &str) -> Result<TcpConnection, ConnectionError> {
        let (host, port) = resolve_target(key)?;

        debug!("Opening TCP connection to {}:{} for {}", host, port, key);
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host.as_str(), port)))
            .await
            .map_err(|_| ConnectionError::Timeout(self.connect_timeout.as_secs()))??;
        stream.set_nodelay(true)?;
        let peer_addr = stream.peer_addr()?;

        Ok(TcpConnection {
            key: key.to_string(),
            peer_addr,
            opened_at: now(),
            stream: Mutex::new(stream),
        })
    }

    async fn close(&self, connection: Arc<TcpConnection>) -> Result<(), ConnectionError> {
        debug!("Closing TCP connection to {} ({})", connection.key, connection.peer_addr);
        let mut stream = connection.stream.lock().await;
        match stream.shutdown().await {
            Ok(()) => Ok(()),
            // Peer already went away
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}
