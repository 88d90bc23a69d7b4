//! Property tests for pool capacity bookkeeping.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use xdb_pool::{Lease, Pool, PoolConfig};
use xdb_testing::MockSource;

#[derive(Debug, Clone)]
enum Op {
    Checkout,
    Release(usize),
    FailProbe,
    FailReset,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Checkout),
        3 => any::<usize>().prop_map(Op::Release),
        1 => Just(Op::FailProbe),
        1 => Just(Op::FailReset),
    ]
}

proptest! {
    #[test]
    fn checked_out_never_exceeds_max(max in 1usize..5, ops in prop::collection::vec(op(), 1..40)) {
        let source = MockSource::empty();
        let pool = Pool::new(
            Arc::new(source.clone()),
            PoolConfig::new().max_size(max).queue_timeout(Duration::ZERO),
        )
        .unwrap();
        let mut held: Vec<Lease> = Vec::new();

        for op in ops {
            match op {
                Op::Checkout => match pool.get() {
                    Ok(lease) => held.push(lease),
                    Err(e) => prop_assert!(e.is_timeout()),
                },
                Op::Release(i) if !held.is_empty() => {
                    let idx = i % held.len();
                    drop(held.swap_remove(idx));
                }
                Op::Release(_) => {}
                Op::FailProbe => source.fail_next_probes(1),
                Op::FailReset => source.fail_next_resets(1),
            }

            let status = pool.status();
            prop_assert!(held.len() <= max);
            prop_assert_eq!(status.in_use, held.len());
            prop_assert!(status.total <= max);
            prop_assert_eq!(source.counters().live(), status.total);
        }
    }
}
