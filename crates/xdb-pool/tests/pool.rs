//! Pool behaviour tests against the scripted mock source.
//!
//! These run entirely in-process:
//!
//! ```bash
//! cargo test -p xdb-pool --test pool
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use xdb_pool::{Lease, Pool, PoolConfig, PoolError};
use xdb_testing::MockSource;
use xdb_transport::Command;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn pool(source: &MockSource, config: PoolConfig) -> Pool {
    init_tracing();
    Pool::new(Arc::new(source.clone()), config).unwrap()
}

// =============================================================================
// Capacity and waiting
// =============================================================================

#[test]
fn test_waiter_gets_released_session() {
    let source = MockSource::empty();
    let pool = pool(
        &source,
        PoolConfig::new()
            .max_size(2)
            .queue_timeout(Duration::from_millis(50)),
    );

    let a = pool.get().unwrap();
    let _b = pool.get().unwrap();
    let a_id = a.metadata().id;

    let (tx, rx) = mpsc::channel();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || {
            tx.send(()).unwrap();
            pool.acquire(Some(Duration::from_secs(5)))
        })
    };

    rx.recv().unwrap();
    thread::sleep(Duration::from_millis(20));
    drop(a);

    let c = waiter.join().unwrap().unwrap();
    assert_eq!(c.metadata().id, a_id);
    assert_eq!(source.counters().created, 2);
    assert_eq!(source.counters().resets, 1);
    assert!(pool.status().is_at_capacity());
}

#[test]
fn test_checkout_times_out() {
    let source = MockSource::empty();
    let pool = pool(
        &source,
        PoolConfig::new()
            .max_size(2)
            .queue_timeout(Duration::from_millis(50)),
    );

    let _a = pool.get().unwrap();
    let _b = pool.get().unwrap();

    let started = Instant::now();
    let err = pool.get().unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(started.elapsed() >= Duration::from_millis(50));
    assert!(matches!(err, PoolError::Timeout { max_size: 2, .. }));

    let metrics = pool.metrics();
    assert_eq!(metrics.checkouts_successful, 2);
    assert_eq!(metrics.checkouts_failed, 1);
}

#[test]
fn test_close_wakes_waiters() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(1).wait_indefinitely());
    let held = pool.get().unwrap();

    let (tx, rx) = mpsc::channel();
    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                tx.send(()).unwrap();
                pool.get()
            })
        })
        .collect();
    for _ in 0..3 {
        rx.recv().unwrap();
    }
    thread::sleep(Duration::from_millis(20));

    pool.close();
    for waiter in waiters {
        assert!(matches!(waiter.join().unwrap(), Err(PoolError::PoolClosed)));
    }

    // the checked-out session is closed when it comes back
    assert_eq!(source.counters().closed, 0);
    drop(held);
    assert_eq!(source.counters().closed, 1);
    assert!(matches!(pool.get(), Err(PoolError::PoolClosed)));
}

#[test]
fn test_close_closes_idle_sessions() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(3));
    {
        let _a = pool.get().unwrap();
        let _b = pool.get().unwrap();
    }
    assert_eq!(pool.status().available, 2);

    pool.close();
    pool.close();
    assert!(pool.is_closed());
    assert_eq!(source.counters().closed, 2);
    assert_eq!(pool.status().total, 0);
}

// =============================================================================
// Eviction
// =============================================================================

#[test]
fn test_idle_ttl_evicts_only_idle_sessions() {
    let source = MockSource::empty();
    let pool = pool(
        &source,
        PoolConfig::new()
            .max_size(2)
            .idle_timeout(Duration::from_millis(30)),
    );

    let held = pool.get().unwrap();
    let held_id = held.metadata().id;
    drop(pool.get().unwrap());

    thread::sleep(Duration::from_millis(60));

    // the expired idle session is swept; the held one survives the TTL
    let fresh = pool.get().unwrap();
    assert_ne!(fresh.metadata().id, held_id);
    assert_eq!(fresh.metadata().checkout_count, 1);
    assert_eq!(source.counters().created, 3);
    assert_eq!(source.counters().closed, 1);
    assert!(held.session().is_ok());
}

#[test]
fn test_failed_probe_evicts_session() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(1));

    let first = pool.get().unwrap().metadata().id;
    source.fail_next_probes(1);

    let lease = pool.get().unwrap();
    assert_ne!(lease.metadata().id, first);
    let counters = source.counters();
    assert_eq!(counters.probes, 1);
    assert_eq!(counters.created, 2);
    assert_eq!(counters.closed, 1);
    assert_eq!(pool.metrics().health_checks_failed, 1);
}

#[test]
fn test_failed_reset_evicts_session() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(1));

    source.fail_next_resets(1);
    let first = pool.get().unwrap().metadata().id;
    assert_eq!(pool.status().total, 0);
    assert_eq!(source.counters().closed, 1);

    let lease = pool.get().unwrap();
    assert_ne!(lease.metadata().id, first);
    assert_eq!(pool.metrics().resets_failed, 1);
}

#[test]
fn test_reset_disabled_skips_reset() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().reset_on_release(false));
    drop(pool.get().unwrap());
    drop(pool.get().unwrap());
    assert_eq!(source.counters().resets, 0);
}

#[test]
fn test_connect_failure_frees_slot() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(1));

    source.fail_next_connects(1);
    let err = pool.get().unwrap_err();
    assert!(matches!(err, PoolError::Connection(_)));
    assert!(err.is_transient());

    assert!(pool.get().is_ok());
}

// =============================================================================
// Leases
// =============================================================================

#[test]
fn test_bypass_mode_opens_fresh_sessions() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().enabled(false));

    let a = pool.get().unwrap();
    let b = pool.get().unwrap();
    assert!(!a.is_pooled());
    drop(a);
    drop(b);

    let counters = source.counters();
    assert_eq!(counters.created, 2);
    assert_eq!(counters.closed, 2);
    assert_eq!(counters.resets, 0);
    assert_eq!(pool.status().total, 0);

    pool.close();
    assert!(matches!(pool.get(), Err(PoolError::PoolClosed)));
}

#[test]
fn test_release_is_idempotent() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(1));

    let mut lease = pool.get().unwrap();
    lease.session().unwrap().submit(&Command::new("SELECT 1")).unwrap();
    lease.release();
    lease.release();
    drop(lease);

    assert_eq!(source.counters().resets, 1);
    assert_eq!(pool.status().available, 1);
}

#[test]
fn test_transfer_keeps_checkout() {
    let source = MockSource::empty();
    let pool = pool(&source, PoolConfig::new().max_size(1));

    let mut original = Lease::acquire(&pool).unwrap();
    let moved = original.transfer();
    assert!(original.is_released());
    assert!(matches!(original.session(), Err(PoolError::LeaseReleased)));
    drop(original);

    assert_eq!(pool.status().in_use, 1);
    assert!(pool.try_get().unwrap().is_none());
    drop(moved);
    assert_eq!(pool.status().available, 1);
}
