//! Connection pool implementation.
//!
//! Two independent locks protect the pool. `entries` guards the session
//! list and is never held across I/O or a wait. `signal` guards the closed
//! flag and a wake-up generation counter, and pairs with the `released`
//! condition variable that exhausted callers park on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use xdb_transport::DynDataSource;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::lease::Lease;
use crate::lifecycle::{ConnectionMetadata, ConnectionState, PooledSession};

/// A blocking connection pool.
///
/// The pool manages a bounded set of physical sessions for one data
/// source. Cloning a `Pool` yields another handle to the same pool.
///
/// # Example
///
/// ```rust,ignore
/// use xdb_pool::{Pool, PoolConfig};
///
/// let pool = Pool::new(source, PoolConfig::new().max_size(10))?;
/// let lease = pool.get()?;
/// // Use lease.session()...
/// ```
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    /// Pool configuration.
    config: PoolConfig,

    /// Where new sessions come from.
    source: DynDataSource,

    /// Pooled sessions, idle and checked out.
    entries: Mutex<Entries>,

    /// Closed flag and wake-up generation.
    signal: Mutex<Signal>,

    /// Notified whenever a slot may have become available.
    released: Condvar,

    /// Counter for generating connection IDs.
    next_connection_id: AtomicU64,

    /// When the pool was created.
    created_at: Instant,

    /// Pool metrics.
    metrics: Mutex<PoolMetricsInner>,
}

#[derive(Default)]
struct Entries {
    list: Vec<PoolEntry>,
    /// Sessions being opened outside the lock; they count against capacity.
    connecting: usize,
}

#[derive(Debug, Default)]
struct Signal {
    closed: bool,
    generation: u64,
}

struct PoolEntry {
    session: Arc<PooledSession>,
    state: ConnectionState,
    /// `None` while checked out or when idle sessions never expire.
    expires_at: Option<Instant>,
    metadata: ConnectionMetadata,
}

impl PoolEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.state == ConnectionState::Idle && self.expires_at.is_some_and(|at| at <= now)
    }
}

impl Entries {
    /// Remove idle entries whose TTL has passed.
    fn sweep(&mut self, now: Instant) -> Vec<Arc<PooledSession>> {
        if !self.list.iter().any(|e| e.is_expired(now)) {
            return Vec::new();
        }
        let (expired, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.list)
            .into_iter()
            .partition(|e| e.is_expired(now));
        self.list = keep;
        expired.into_iter().map(|e| e.session).collect()
    }

    fn remove(&mut self, id: u64) -> Option<PoolEntry> {
        let pos = self.list.iter().position(|e| e.session.id() == id)?;
        Some(self.list.remove(pos))
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut PoolEntry> {
        self.list.iter_mut().find(|e| e.session.id() == id)
    }
}

enum Candidate {
    Idle(Arc<PooledSession>, ConnectionMetadata),
    Create,
    Exhausted,
}

/// Internal metrics tracking.
#[derive(Debug, Default)]
struct PoolMetricsInner {
    /// Total connections created.
    connections_created: u64,
    /// Total connections closed.
    connections_closed: u64,
    /// Total successful checkouts.
    checkouts_successful: u64,
    /// Total failed checkouts (timeouts, errors).
    checkouts_failed: u64,
    /// Total health checks performed.
    health_checks_performed: u64,
    /// Total health check failures.
    health_checks_failed: u64,
    /// Total resets performed.
    resets_performed: u64,
    /// Total reset failures.
    resets_failed: u64,
}

impl Pool {
    /// Create a new pool builder.
    ///
    /// Use the builder to configure the pool before creating it.
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Create a new pool over `source` with the given configuration.
    ///
    /// No session is opened until the first checkout.
    pub fn new(source: DynDataSource, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        tracing::info!(
            source = %source.describe(),
            enabled = config.enabled,
            max = config.max_size,
            queue_timeout = ?config.queue_timeout,
            idle_timeout = ?config.idle_timeout,
            "connection pool created"
        );

        let inner = Arc::new(PoolInner {
            config,
            source,
            entries: Mutex::new(Entries::default()),
            signal: Mutex::new(Signal::default()),
            released: Condvar::new(),
            next_connection_id: AtomicU64::new(1),
            created_at: Instant::now(),
            metrics: Mutex::new(PoolMetricsInner::default()),
        });

        Ok(Self { inner })
    }

    /// Get a session, waiting up to the configured queue timeout.
    pub fn get(&self) -> Result<Lease, PoolError> {
        self.acquire(self.inner.config.queue_timeout)
    }

    /// Get a session, waiting up to `timeout` (`None` waits indefinitely).
    ///
    /// This either returns an idle session that passes the liveness probe,
    /// or opens a new one if the pool is below capacity. Otherwise the
    /// calling thread parks until a session is released, the deadline
    /// passes or the pool is closed.
    pub fn acquire(&self, timeout: Option<Duration>) -> Result<Lease, PoolError> {
        let started = Instant::now();
        let deadline = timeout.and_then(|t| started.checked_add(t));

        if !self.inner.config.is_pooling() {
            if self.is_closed() {
                return Err(PoolError::PoolClosed);
            }
            return Lease::direct(self.inner.source.as_ref());
        }

        tracing::trace!("acquiring connection from pool");

        loop {
            let seen = {
                let signal = self.inner.signal.lock();
                if signal.closed {
                    return Err(self.inner.checkout_failed(PoolError::PoolClosed));
                }
                signal.generation
            };

            match self.inner.try_checkout(deadline) {
                Ok(Some(lease)) => return Ok(lease),
                Ok(None) => {}
                Err(e) => return Err(self.inner.checkout_failed(e)),
            }

            let mut signal = self.inner.signal.lock();
            if signal.closed {
                return Err(self.inner.checkout_failed(PoolError::PoolClosed));
            }
            if signal.generation != seen {
                // something was released between the scan and now
                continue;
            }

            match deadline {
                Some(deadline) => {
                    let timed_out = self
                        .inner
                        .released
                        .wait_until(&mut signal, deadline)
                        .timed_out();
                    if timed_out && signal.generation == seen && !signal.closed {
                        let waited = started.elapsed();
                        tracing::debug!(waited = ?waited, "checkout timed out");
                        return Err(self.inner.checkout_failed(PoolError::Timeout {
                            waited,
                            max_size: self.inner.config.max_size,
                        }));
                    }
                }
                None => self.inner.released.wait(&mut signal),
            }
        }
    }

    /// Try to get a session without waiting.
    ///
    /// Returns `None` if the pool is at capacity with no idle session.
    pub fn try_get(&self) -> Result<Option<Lease>, PoolError> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }
        if !self.inner.config.is_pooling() {
            return Lease::direct(self.inner.source.as_ref()).map(Some);
        }
        self.inner
            .try_checkout(None)
            .map_err(|e| self.inner.checkout_failed(e))
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let entries = self.inner.entries.lock();
        let in_use = entries
            .list
            .iter()
            .filter(|e| e.state == ConnectionState::InUse)
            .count();
        PoolStatus {
            available: entries.list.len() - in_use,
            in_use,
            total: entries.list.len(),
            connecting: entries.connecting,
            max: self.inner.config.max_size,
        }
    }

    /// Get pool metrics.
    #[must_use]
    pub fn metrics(&self) -> PoolMetrics {
        let inner = self.inner.metrics.lock();
        PoolMetrics {
            connections_created: inner.connections_created,
            connections_closed: inner.connections_closed,
            checkouts_successful: inner.checkouts_successful,
            checkouts_failed: inner.checkouts_failed,
            health_checks_performed: inner.health_checks_performed,
            health_checks_failed: inner.health_checks_failed,
            resets_performed: inner.resets_performed,
            resets_failed: inner.resets_failed,
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Close the pool.
    ///
    /// Idle sessions are closed right away. Checked-out sessions are closed
    /// by their lease when it is released. Every waiting caller wakes up
    /// with [`PoolError::PoolClosed`]; later checkouts fail the same way.
    pub fn close(&self) {
        {
            let mut signal = self.inner.signal.lock();
            if signal.closed {
                return;
            }
            signal.closed = true;
            signal.generation = signal.generation.wrapping_add(1);
        }
        self.inner.released.notify_all();

        let idle: Vec<_> = {
            let mut entries = self.inner.entries.lock();
            std::mem::take(&mut entries.list)
                .into_iter()
                .filter(|e| e.state == ConnectionState::Idle)
                .map(|e| e.session)
                .collect()
        };
        let count = idle.len();
        self.inner.close_sessions(idle);

        tracing::info!(closed_idle = count, "connection pool closed");
    }

    /// Check if the pool is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

impl PoolInner {
    fn is_closed(&self) -> bool {
        self.signal.lock().closed
    }

    /// Generate a new unique connection ID.
    fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    fn checkout_failed(&self, err: PoolError) -> PoolError {
        self.metrics.lock().checkouts_failed += 1;
        err
    }

    /// Wake one parked caller.
    fn notify_one(&self) {
        {
            let mut signal = self.signal.lock();
            signal.generation = signal.generation.wrapping_add(1);
        }
        self.released.notify_one();
    }

    fn close_sessions(&self, sessions: Vec<Arc<PooledSession>>) {
        if sessions.is_empty() {
            return;
        }
        let count = sessions.len() as u64;
        for session in sessions {
            tracing::debug!(connection_id = session.id(), "closing pooled session");
            session.close_quietly();
        }
        self.metrics.lock().connections_closed += count;
    }

    /// One pass of the checkout algorithm: sweep, reuse an idle session,
    /// or open a new one. `Ok(None)` means the caller has to wait.
    fn try_checkout(self: &Arc<Self>, deadline: Option<Instant>) -> Result<Option<Lease>, PoolError> {
        loop {
            let (candidate, expired) = {
                let mut entries = self.entries.lock();
                let expired = entries.sweep(Instant::now());

                let idle = entries
                    .list
                    .iter_mut()
                    .find(|e| e.state == ConnectionState::Idle);

                let candidate = if let Some(entry) = idle {
                    entry.state = ConnectionState::InUse;
                    entry.expires_at = None;
                    entry.metadata.record_checkout();
                    Candidate::Idle(Arc::clone(&entry.session), entry.metadata.clone())
                } else if entries.list.len() + entries.connecting < self.config.max_size {
                    entries.connecting += 1;
                    Candidate::Create
                } else {
                    Candidate::Exhausted
                };
                (candidate, expired)
            };

            if !expired.is_empty() {
                tracing::debug!(count = expired.len(), "evicting expired idle sessions");
                self.close_sessions(expired);
            }

            match candidate {
                Candidate::Idle(session, metadata) => {
                    if !self.config.test_on_checkout || self.probe(&session) {
                        self.metrics.lock().checkouts_successful += 1;
                        tracing::trace!(connection_id = session.id(), "reusing idle session");
                        return Ok(Some(Lease::pooled(
                            session,
                            Arc::clone(self),
                            metadata,
                            deadline,
                        )));
                    }
                    tracing::debug!(
                        connection_id = session.id(),
                        "idle session failed liveness probe, evicting"
                    );
                    self.entries.lock().remove(session.id());
                    self.close_sessions(vec![session]);
                }
                Candidate::Create => return self.open_new(deadline).map(Some),
                Candidate::Exhausted => return Ok(None),
            }
        }
    }

    fn open_new(self: &Arc<Self>, deadline: Option<Instant>) -> Result<Lease, PoolError> {
        let conn = match self.source.connect() {
            Ok(conn) => conn,
            Err(e) => {
                self.entries.lock().connecting -= 1;
                // the reserved slot is free again
                self.notify_one();
                tracing::debug!(error = %e, "failed to open pooled session");
                return Err(PoolError::Connection(e));
            }
        };

        let id = self.next_connection_id();
        let session = Arc::new(PooledSession::new(id, conn));
        let mut metadata = ConnectionMetadata::new(id);
        metadata.record_checkout();

        {
            let mut entries = self.entries.lock();
            entries.connecting -= 1;
            if !self.is_closed() {
                entries.list.push(PoolEntry {
                    session: Arc::clone(&session),
                    state: ConnectionState::InUse,
                    expires_at: None,
                    metadata: metadata.clone(),
                });
            } else {
                drop(entries);
                session.close_quietly();
                return Err(PoolError::PoolClosed);
            }
        }

        {
            let mut metrics = self.metrics.lock();
            metrics.connections_created += 1;
            metrics.checkouts_successful += 1;
        }
        tracing::debug!(connection_id = id, "opened new pooled session");

        Ok(Lease::pooled(session, Arc::clone(self), metadata, deadline))
    }

    fn probe(&self, session: &PooledSession) -> bool {
        let ok = session.probe();
        let mut metrics = self.metrics.lock();
        metrics.health_checks_performed += 1;
        if !ok {
            metrics.health_checks_failed += 1;
        }
        ok
    }

    /// Take a session back from a lease.
    pub(crate) fn release(&self, session: Arc<PooledSession>) {
        let id = session.id();

        if self.is_closed() {
            tracing::trace!(connection_id = id, "pool closed, discarding returned session");
            self.entries.lock().remove(id);
            self.close_sessions(vec![session]);
            return;
        }

        let reset_ok = if self.config.reset_on_release {
            let result = session.lock().reset();
            let mut metrics = self.metrics.lock();
            metrics.resets_performed += 1;
            match result {
                Ok(()) => true,
                Err(e) => {
                    metrics.resets_failed += 1;
                    tracing::debug!(connection_id = id, error = %e, "reset failed, evicting session");
                    false
                }
            }
        } else {
            true
        };

        let mut to_close = {
            let mut entries = self.entries.lock();
            let now = Instant::now();
            let mut discard = None;

            if reset_ok {
                match entries.find_mut(id) {
                    Some(entry) => {
                        entry.state = ConnectionState::Idle;
                        entry.expires_at = self.config.idle_timeout.and_then(|t| now.checked_add(t));
                    }
                    // pool was cleared by close() in the meantime
                    None => discard = Some(Arc::clone(&session)),
                }
            } else {
                entries.remove(id);
                discard = Some(Arc::clone(&session));
            }

            let mut expired = entries.sweep(now);
            expired.extend(discard);
            expired
        };
        drop(session);

        to_close.dedup_by_key(|s| s.id());
        self.close_sessions(to_close);
        tracing::trace!(connection_id = id, "session returned to pool");

        self.notify_one();
    }
}

/// Builder for creating a connection pool.
///
/// # Example
///
/// ```rust,ignore
/// let pool = Pool::builder()
///     .source(source)
///     .max_size(10)
///     .build()?;
/// ```
pub struct PoolBuilder {
    source: Option<DynDataSource>,
    pool_config: PoolConfig,
}

impl PoolBuilder {
    /// Create a new pool builder with default settings.
    pub fn new() -> Self {
        Self {
            source: None,
            pool_config: PoolConfig::default(),
        }
    }

    /// Set the data source sessions are opened from.
    #[must_use]
    pub fn source(mut self, source: DynDataSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the pool configuration.
    #[must_use]
    pub fn pool_config(mut self, config: PoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// Enable or disable pooling.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.pool_config.enabled = enabled;
        self
    }

    /// Set the maximum number of sessions.
    #[must_use]
    pub fn max_size(mut self, size: usize) -> Self {
        self.pool_config.max_size = size;
        self
    }

    /// Set the checkout wait timeout.
    #[must_use]
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.queue_timeout = Some(timeout);
        self
    }

    /// Set the idle session timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_config.idle_timeout = Some(timeout);
        self
    }

    /// Enable or disable the reset on release.
    #[must_use]
    pub fn reset_on_release(mut self, enabled: bool) -> Self {
        self.pool_config.reset_on_release = enabled;
        self
    }

    /// Build the pool.
    pub fn build(self) -> Result<Pool, PoolError> {
        let source = self
            .source
            .ok_or_else(|| PoolError::Configuration("no data source configured".into()))?;
        Pool::new(source, self.pool_config)
    }
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle sessions available.
    pub available: usize,
    /// Number of sessions currently checked out.
    pub in_use: usize,
    /// Total number of pooled sessions.
    pub total: usize,
    /// Sessions being opened right now.
    pub connecting: usize,
    /// Maximum allowed sessions.
    pub max: usize,
}

impl PoolStatus {
    /// Calculate the utilization percentage.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.max == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max as f64) * 100.0
    }

    /// Check if the pool is at capacity.
    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total + self.connecting >= self.max
    }
}

/// Metrics collected from the pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    /// Total connections created since pool start.
    pub connections_created: u64,
    /// Total connections closed since pool start.
    pub connections_closed: u64,
    /// Successful checkouts.
    pub checkouts_successful: u64,
    /// Failed checkouts (timeouts, pool closed, connect errors).
    pub checkouts_failed: u64,
    /// Liveness probes performed.
    pub health_checks_performed: u64,
    /// Liveness probes that failed.
    pub health_checks_failed: u64,
    /// Resets performed.
    pub resets_performed: u64,
    /// Resets that failed.
    pub resets_failed: u64,
    /// Time since pool creation.
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }

    /// Calculate health check success rate (0.0 to 1.0).
    #[must_use]
    pub fn health_check_success_rate(&self) -> f64 {
        if self.health_checks_performed == 0 {
            return 1.0;
        }
        let successful = self.health_checks_performed - self.health_checks_failed;
        successful as f64 / self.health_checks_performed as f64
    }
}
