//! Fuzz the evictor with arbitrary operation sequences.
//!
//! Each input byte pair decodes to one operation. After every step the
//! recency sequence and the index must agree, and no identity with a
//! request in flight may have left the cache.
//!
//! Run with: cargo +nightly fuzz run evictor_ops -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use servitor_test_utils::{assert_bijection, mock_evictor, CallOutPolicy, Identity, Op, OpRunner};

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn decode(tag: u8, arg: u8) -> Op {
    match tag % 8 {
        0..=3 => {
            let name = NAMES[usize::from(arg) % NAMES.len()];
            let category = if arg & 0x80 == 0 { "" } else { "files" };
            Op::Locate(Identity::new(name, category))
        }
        4 | 5 => Op::Finish(usize::from(arg)),
        6 => Op::Deactivate,
        _ => Op::SetCapacity(usize::from(arg % 8)),
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&header, rest)) = data.split_first() else {
        return;
    };
    let call_out = if header & 1 == 0 {
        CallOutPolicy::Serialized
    } else {
        CallOutPolicy::Concurrent
    };
    let (evictor, _) = mock_evictor(usize::from(header >> 1) % 8, call_out);
    let mut runner = OpRunner::new(&evictor);

    for pair in rest.chunks_exact(2) {
        let op = decode(pair[0], pair[1]);
        runner.apply(&op).expect("mock factory never fails");
        assert_bijection(&evictor);
        for identity in runner.held() {
            assert!(
                evictor.contains(&identity).unwrap(),
                "in-use entry {identity} was evicted"
            );
        }
    }

    runner.drain().expect("finishing held cookies");
    assert_bijection(&evictor);
});
