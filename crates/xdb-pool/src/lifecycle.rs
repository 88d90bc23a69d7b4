//! Pooled session handles and their bookkeeping.

use std::time::Instant;

use parking_lot::Mutex;
use xdb_transport::PhysicalSession;

/// Checkout state of a pool entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// In the pool, available for checkout.
    Idle,
    /// Checked out by a lease (or being probed for one).
    InUse,
}

/// Metadata tracked for each pooled session.
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// Pool-unique session id; 0 for sessions opened outside a pool.
    pub id: u64,
    /// When the session was opened.
    pub created_at: Instant,
    /// When the session was last checked out.
    pub last_checkout: Option<Instant>,
    /// How many times the session was checked out.
    pub checkout_count: u64,
}

impl ConnectionMetadata {
    pub(crate) fn new(id: u64) -> Self {
        Self {
            id,
            created_at: Instant::now(),
            last_checkout: None,
            checkout_count: 0,
        }
    }

    pub(crate) fn record_checkout(&mut self) {
        self.last_checkout = Some(Instant::now());
        self.checkout_count += 1;
    }

    /// Time since the session was opened.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }
}

/// A physical session shared between the pool and the lease holding it.
///
/// The mutex is uncontended in correct use: the pool touches a session only
/// while it is idle, a lease only while it is checked out.
pub struct PooledSession {
    id: u64,
    conn: Mutex<Box<dyn PhysicalSession>>,
}

impl PooledSession {
    pub(crate) fn new(id: u64, conn: Box<dyn PhysicalSession>) -> Self {
        Self {
            id,
            conn: Mutex::new(conn),
        }
    }

    /// Pool-unique id of this session.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, Box<dyn PhysicalSession>> {
        self.conn.lock()
    }

    pub(crate) fn probe(&self) -> bool {
        self.conn.lock().is_valid()
    }

    /// Close the connection, logging instead of returning a failure.
    pub(crate) fn close_quietly(&self) {
        if let Err(e) = self.conn.lock().close() {
            tracing::warn!(connection_id = self.id, error = %e, "error closing session");
        }
    }
}

impl std::fmt::Debug for PooledSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_bookkeeping() {
        let mut meta = ConnectionMetadata::new(7);
        assert_eq!(meta.checkout_count, 0);
        assert!(meta.last_checkout.is_none());

        meta.record_checkout();
        meta.record_checkout();
        assert_eq!(meta.checkout_count, 2);
        assert!(meta.last_checkout.is_some());
        assert!(meta.last_checkout >= Some(meta.created_at));
    }
}
