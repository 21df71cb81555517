//! Error handling module for the connection pool

use thiserror::Error;

/// Errors raised by a connection factory while opening or releasing a connection
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid destination '{0}'")]
    InvalidDestination(String),

    #[error("Connect timed out after {0}s")]
    Timeout(u64),

    #[error("Connection refused: {0}")]
    Refused(String),
}

/// Errors surfaced by the pool itself
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Connection establishment failed for key '{key}': {source}")]
    ConnectionEstablishment {
        key: String,
        #[source]
        source: ConnectionError,
    },

    #[error("Pool invariant violated: {0}")]
    InvariantViolation(String),

    #[error("Destination key must not be empty")]
    EmptyKey,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PoolError {
    /// Key the failure relates to, when there is one
    pub fn key(&self) -> Option<&str> {
        match self {
            PoolError::ConnectionEstablishment { key, .. } => Some(key),
            _ => None,
        }
    }
}
