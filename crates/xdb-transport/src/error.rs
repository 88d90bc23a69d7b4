//! Transport-level error types.

use thiserror::Error;

/// Errors reported by the transport layer.
///
/// These describe failures of the connection itself. Errors the server
/// reports about a command travel inside the reply as a
/// [`ServerError`](crate::ServerError) instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// IO error during read/write operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// The peer sent something the transport could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Waiting for the server exceeded the transport's own deadline.
    #[error("operation timed out")]
    Timeout,

    /// No endpoint of a data source accepted a connection.
    #[error("no endpoint reachable (tried {attempted})")]
    NoEndpoint {
        /// Number of endpoints that were tried.
        attempted: usize,
    },

    /// The operation is not supported by this transport.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl TransportError {
    /// Whether the error means the physical connection is no longer usable.
    #[must_use]
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed | Self::NoEndpoint { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lost_classification() {
        assert!(TransportError::ConnectionClosed.is_connection_lost());
        assert!(
            TransportError::Io(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
                .is_connection_lost()
        );
        assert!(!TransportError::Protocol("bad frame".into()).is_connection_lost());
        assert!(!TransportError::Timeout.is_connection_lost());
    }

    #[test]
    fn test_display() {
        let err = TransportError::NoEndpoint { attempted: 3 };
        assert_eq!(err.to_string(), "no endpoint reachable (tried 3)");
    }
}
