//! Pool error types.

use std::time::Duration;

use thiserror::Error;
use xdb_transport::TransportError;

/// Errors returned by the pool and its leases.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool was closed before or while waiting for a session.
    #[error("connection pool is closed")]
    PoolClosed,

    /// No session became available before the checkout deadline.
    #[error("timed out after {waited:?} waiting for a session (max size {max_size})")]
    Timeout {
        /// How long the caller waited.
        waited: Duration,
        /// Pool capacity at the time.
        max_size: usize,
    },

    /// Opening a new session failed.
    #[error("failed to open session: {0}")]
    Connection(#[from] TransportError),

    /// Invalid pool configuration.
    #[error("invalid pool configuration: {0}")]
    Configuration(String),

    /// The lease no longer owns a session.
    #[error("lease has already been released")]
    LeaseReleased,
}

impl PoolError {
    /// Whether this is a checkout timeout.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether retrying the checkout later could succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let timeout = PoolError::Timeout {
            waited: Duration::from_millis(50),
            max_size: 2,
        };
        assert!(timeout.is_timeout());
        assert!(timeout.is_transient());
        assert!(!PoolError::PoolClosed.is_transient());
        assert!(PoolError::from(TransportError::ConnectionClosed).is_transient());
    }
}
