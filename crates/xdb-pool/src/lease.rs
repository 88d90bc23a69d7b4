//! Leases: exclusive handles on a checked-out session.

use std::sync::Arc;
use std::time::Instant;

use xdb_transport::{DataSource, PhysicalSession};

use crate::error::PoolError;
use crate::lifecycle::{ConnectionMetadata, PooledSession};
use crate::pool::{Pool, PoolInner};

/// Guard giving access to the physical session behind a lease.
pub type SessionGuard<'a> = parking_lot::MutexGuard<'a, Box<dyn PhysicalSession>>;

/// Exclusive use of one physical session.
///
/// A pooled lease returns its session to the pool on [`release`](Self::release)
/// or drop. A direct lease (pooling disabled) closes its session instead.
/// Releasing twice is a no-op.
pub struct Lease {
    session: Option<Arc<PooledSession>>,
    pool: Option<Arc<PoolInner>>,
    metadata: ConnectionMetadata,
    deadline: Option<Instant>,
}

impl Lease {
    pub(crate) fn pooled(
        session: Arc<PooledSession>,
        pool: Arc<PoolInner>,
        metadata: ConnectionMetadata,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            session: Some(session),
            pool: Some(pool),
            metadata,
            deadline,
        }
    }

    /// Open a session straight from `source`, outside any pool.
    pub fn direct(source: &dyn DataSource) -> Result<Self, PoolError> {
        let conn = source.connect()?;
        tracing::debug!(source = %source.describe(), "opened unpooled session");

        let mut metadata = ConnectionMetadata::new(0);
        metadata.record_checkout();

        Ok(Self {
            session: Some(Arc::new(PooledSession::new(0, conn))),
            pool: None,
            metadata,
            deadline: None,
        })
    }

    /// Check a session out of `pool`.
    ///
    /// Same as [`Pool::get`].
    pub fn acquire(pool: &Pool) -> Result<Self, PoolError> {
        pool.get()
    }

    /// Lock the physical session for a protocol exchange.
    pub fn session(&self) -> Result<SessionGuard<'_>, PoolError> {
        self.session
            .as_ref()
            .map(|s| s.lock())
            .ok_or(PoolError::LeaseReleased)
    }

    /// Give the session back.
    ///
    /// Pooled sessions go back to their pool, direct ones are closed.
    /// Calling this on a released lease does nothing.
    pub fn release(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        match self.pool.take() {
            Some(pool) => {
                tracing::trace!(connection_id = session.id(), "returning connection to pool");
                pool.release(session);
            }
            None => {
                tracing::debug!("closing unpooled session");
                session.close_quietly();
            }
        }
    }

    /// Whether the lease has given up its session.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.session.is_none()
    }

    /// Move the session into a new lease, leaving this one released.
    ///
    /// Releasing or dropping `self` afterwards does not affect the
    /// returned lease.
    #[must_use]
    pub fn transfer(&mut self) -> Lease {
        Lease {
            session: self.session.take(),
            pool: self.pool.take(),
            metadata: self.metadata.clone(),
            deadline: self.deadline,
        }
    }

    /// Bookkeeping for the leased session.
    #[must_use]
    pub fn metadata(&self) -> &ConnectionMetadata {
        &self.metadata
    }

    /// Checkout deadline the lease was acquired under, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the session belongs to a pool.
    #[must_use]
    pub fn is_pooled(&self) -> bool {
        self.pool.is_some()
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("connection_id", &self.metadata.id)
            .field("pooled", &self.pool.is_some())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdb_testing::MockSource;
    use xdb_transport::Command;

    #[test]
    fn test_direct_lease_closes_on_release() {
        let source = MockSource::empty();
        let mut lease = Lease::direct(&source).unwrap();
        assert!(!lease.is_pooled());
        assert_eq!(lease.metadata().id, 0);

        lease.session().unwrap().submit(&Command::new("SELECT 1")).unwrap();
        lease.release();
        lease.release();

        let counters = source.counters();
        assert_eq!(counters.created, 1);
        assert_eq!(counters.closed, 1);
        assert!(matches!(lease.session(), Err(PoolError::LeaseReleased)));
    }

    #[test]
    fn test_transfer_leaves_source_released() {
        let source = MockSource::empty();
        let mut lease = Lease::direct(&source).unwrap();
        let moved = lease.transfer();

        assert!(lease.is_released());
        assert!(!moved.is_released());
        drop(lease);
        assert_eq!(source.counters().closed, 0);
        drop(moved);
        assert_eq!(source.counters().closed, 1);
    }
}
