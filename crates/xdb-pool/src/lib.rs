//! # xdb-pool
//!
//! Connection pool for xdb physical sessions.
//!
//! The pool keeps a bounded set of sessions for one data source, hands them
//! out as [`Lease`]s and takes them back when a lease is released. It is a
//! blocking pool: callers that find it exhausted park on a condition
//! variable until a session comes back, the checkout deadline passes or the
//! pool is closed.
//!
//! ## Features
//!
//! - Liveness probe at checkout; broken sessions are evicted, never returned
//! - Protocol-level reset when a session comes back; failed resets evict
//! - Idle TTL sweep on every checkout and release
//! - Checkout deadline with a timeout error instead of a hang
//! - Close wakes every waiter with a "pool closed" error
//! - Bypass mode (pooling disabled) that opens a fresh session per lease
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use xdb_pool::Pool;
//!
//! let pool = Pool::builder()
//!     .source(source)
//!     .max_size(20)
//!     .queue_timeout(Duration::from_secs(5))
//!     .idle_timeout(Duration::from_secs(300))
//!     .build()?;
//!
//! let lease = pool.get()?;
//! lease.session()?.submit(&command)?;
//! // session goes back to the pool when `lease` is dropped
//!
//! let status = pool.status();
//! println!("Pool utilization: {:.1}%", status.utilization());
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod lease;
pub mod lifecycle;
pub mod pool;

// Configuration
pub use config::PoolConfig;

// Error types
pub use error::PoolError;

// Pool types
pub use lease::{Lease, SessionGuard};
pub use pool::{Pool, PoolBuilder, PoolMetrics, PoolStatus};

// Lifecycle management
pub use lifecycle::{ConnectionMetadata, ConnectionState, PooledSession};
