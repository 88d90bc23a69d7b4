//! Pool configuration.

use std::time::Duration;

use crate::error::PoolError;

/// Default maximum number of pooled sessions.
pub const DEFAULT_MAX_SIZE: usize = 25;

/// Configuration for a connection pool.
///
/// `None` for a timeout means "no limit": checkouts wait indefinitely and
/// idle sessions never expire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Whether sessions are pooled at all.
    pub enabled: bool,

    /// Maximum number of sessions, idle and checked out together.
    pub max_size: usize,

    /// How long a checkout may wait for a session.
    pub queue_timeout: Option<Duration>,

    /// How long an idle session may stay in the pool.
    pub idle_timeout: Option<Duration>,

    /// Reset protocol-level session state when a session comes back.
    pub reset_on_release: bool,

    /// Probe an idle session before handing it out.
    pub test_on_checkout: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_MAX_SIZE,
            queue_timeout: None,
            idle_timeout: None,
            reset_on_release: true,
            test_on_checkout: true,
        }
    }
}

impl PoolConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable pooling.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the maximum pool size.
    #[must_use]
    pub fn max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Set how long a checkout may wait.
    #[must_use]
    pub fn queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = Some(timeout);
        self
    }

    /// Let checkouts wait for as long as it takes.
    #[must_use]
    pub fn wait_indefinitely(mut self) -> Self {
        self.queue_timeout = None;
        self
    }

    /// Set the idle TTL.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Keep idle sessions forever.
    #[must_use]
    pub fn no_idle_timeout(mut self) -> Self {
        self.idle_timeout = None;
        self
    }

    /// Enable or disable the reset on release.
    #[must_use]
    pub fn reset_on_release(mut self, enabled: bool) -> Self {
        self.reset_on_release = enabled;
        self
    }

    /// Enable or disable the liveness probe at checkout.
    #[must_use]
    pub fn test_on_checkout(mut self, enabled: bool) -> Self {
        self.test_on_checkout = enabled;
        self
    }

    /// Whether checkouts go through the pool.
    ///
    /// A disabled pool, or one with no room at all, hands out a fresh
    /// session for every lease.
    #[must_use]
    pub fn is_pooling(&self) -> bool {
        self.enabled && self.max_size > 0
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.idle_timeout == Some(Duration::ZERO) {
            return Err(PoolError::Configuration(
                "idle timeout must be positive; use no_idle_timeout() to keep sessions".into(),
            ));
        }
        Ok(())
    }
}
