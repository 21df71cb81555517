//! Connection factories the pool opens and releases connections through
//!
//! The pool never dials sockets itself; it is handed a [`ConnectionFactory`]
//! at construction time. [`TcpConnector`] is the production factory and
//! [`DirectConnector`] wraps any factory to open one connection per request,
//! which is the unpooled baseline the pool is measured against.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ConnectionError;

pub mod direct;
pub mod tcp;

#[cfg(test)]
pub(crate) mod testing;

pub use direct::DirectConnector;
pub use tcp::{TcpConnection, TcpConnector};

/// Opens and releases connections to a destination key
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Connection handle produced by this factory
    type Connection: Send + Sync + 'static;

    /// Open a new connection to `key`
    async fn open(&self, key: &str) -> Result<Self::Connection, ConnectionError>;

    /// Release a connection. Callers may still hold clones of the handle;
    /// the underlying resource is released regardless.
    async fn close(&self, connection: Arc<Self::Connection>) -> Result<(), ConnectionError>;

    /// Factory name for logging
    fn name(&self) -> &'static str;
}
