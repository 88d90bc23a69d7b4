//! Client error types.

use thiserror::Error;
use xdb_pool::PoolError;
use xdb_transport::{ServerError, TransportError};

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Checking a session out of the pool failed.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// The transport failed while talking to the server.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server rejected the command.
    #[error(transparent)]
    Server(ServerError),

    /// A result is still registered on the session.
    ///
    /// Sessions store a pending result before sending a new command, so this
    /// indicates a broken invariant rather than a runtime condition.
    #[error("a previous result is still pending on this session")]
    ResultPending,

    /// The session was released; no further wire access is possible.
    #[error("session is closed")]
    SessionClosed,

    /// The result was closed.
    #[error("result is closed")]
    ResultClosed,

    /// No row-bearing result set is open.
    #[error("no result set is open")]
    NoResultSet,

    /// Invalid client options.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed client options document.
    #[error("invalid client options: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid identifier (potential SQL injection attempt).
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl From<ServerError> for Error {
    fn from(e: ServerError) -> Self {
        Self::Server(e)
    }
}

impl Error {
    /// Check if this error was reported by the server.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Server(_))
    }

    /// Check if this error is transient and may succeed on retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Pool(e) => e.is_transient(),
            Self::Transport(e) => e.is_connection_lost(),
            _ => false,
        }
    }

    /// The server error, if this is one.
    #[must_use]
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Server(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classification() {
        let server = Error::from(ServerError::new(1146, "42S02", "Table 'x' doesn't exist"));
        assert!(server.is_server_error());
        assert!(!server.is_transient());
        assert_eq!(server.server_error().map(|e| e.code), Some(1146));

        let timeout = Error::from(PoolError::Timeout {
            waited: Duration::from_millis(5),
            max_size: 1,
        });
        assert!(timeout.is_transient());
        assert!(Error::from(TransportError::ConnectionClosed).is_transient());
        assert!(!Error::ResultClosed.is_transient());
    }
}
