#![no_main]

use std::sync::Arc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use xdb_client::{Client, ClientOptions, FetchCount};
use xdb_testing::{MockSource, ReplyScript, ResultSetScript};

#[derive(Debug, Arbitrary)]
enum Op {
    GetRow,
    Advance,
    SetPrefetch(u8),
    LoadCache(u8),
    Store,
    NewCommand,
}

#[derive(Debug, Arbitrary)]
struct Input {
    sets: Vec<u8>,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let mut script = ReplyScript::new();
    for (i, size) in input.sets.iter().take(8).enumerate() {
        let base = i as i64 * 1000;
        script = script.result_set(ResultSetScript::ints("n", base..base + i64::from(*size % 64)));
    }

    let source = MockSource::fixed(script);
    let client = Client::new(Arc::new(source.clone()), ClientOptions::default()).unwrap();
    let session = client.get_session().unwrap();
    let mut result = session.sql("CALL sets()").unwrap();
    let mut others = Vec::new();
    let mut last: Option<i64> = None;

    for op in input.ops.iter().take(256) {
        match op {
            Op::GetRow => {
                if let Some(row) = result.get_row().unwrap() {
                    let n: i64 = row.get_str(0).unwrap().parse().unwrap();
                    // rows of one set arrive in order, without gaps
                    if let Some(prev) = last {
                        assert!(n == prev + 1 || n / 1000 > prev / 1000);
                    }
                    last = Some(n);
                }
            }
            Op::Advance => {
                result.advance_result_set().unwrap();
            }
            Op::SetPrefetch(n) => result.set_prefetch(u64::from(*n)),
            Op::LoadCache(0) => result.load_cache(FetchCount::All).unwrap(),
            Op::LoadCache(n) => result.load_cache(FetchCount::Rows(u64::from(*n))).unwrap(),
            Op::Store => result.store().unwrap(),
            Op::NewCommand => others.push(session.sql("SELECT 1").unwrap()),
        }
    }

    drop(result);
    drop(others);
    drop(session);
    assert_eq!(client.pool_status().in_use, 0);
});
