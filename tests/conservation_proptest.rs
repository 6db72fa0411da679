//! Property tests for routing and pool accounting.

use std::collections::BTreeMap;
use std::ptr::NonNull;

use freelist_pool::{
    class_index, round_up, ByteAllocator, PoolAllocator, SizeClass, SystemHeap, MAX_BYTES, NOBJS,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    /// Free the live block at this position (modulo the live count)
    Free(usize),
    Realloc(usize, usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..=MAX_BYTES + 64).prop_map(Op::Alloc),
        3 => any::<usize>().prop_map(Op::Free),
        1 => (any::<usize>(), 0..=MAX_BYTES + 64).prop_map(|(i, n)| Op::Realloc(i, n)),
    ]
}

proptest! {
    #[test]
    fn round_up_stays_in_class(bytes in 1..=MAX_BYTES) {
        prop_assert_eq!(class_index(bytes), class_index(round_up(bytes)));
        prop_assert!(round_up(bytes) >= bytes);
        prop_assert!(round_up(bytes) <= bytes + 7);
        prop_assert_eq!(SizeClass::from_bytes(bytes).map(SizeClass::size), Some(round_up(bytes)));
    }

    #[test]
    fn arena_bytes_are_conserved(ops in prop::collection::vec(op(), 1..300)) {
        let mut pool = PoolAllocator::new(SystemHeap);
        let mut live: Vec<(NonNull<u8>, usize)> = Vec::new();

        for op in ops {
            match op {
                Op::Alloc(bytes) => live.push((pool.allocate(bytes).unwrap(), bytes)),
                Op::Free(i) if !live.is_empty() => {
                    let (ptr, bytes) = live.swap_remove(i % live.len());
                    unsafe { pool.deallocate(ptr, bytes) };
                }
                Op::Realloc(i, new_size) if !live.is_empty() => {
                    let i = i % live.len();
                    let (ptr, bytes) = live[i];
                    live[i] = (unsafe { pool.reallocate(ptr, bytes, new_size) }.unwrap(), new_size);
                }
                _ => {}
            }

            let stats = pool.stats();
            prop_assert!(stats.is_conserved());
            let pooled: usize = live
                .iter()
                .filter(|(_, bytes)| *bytes <= MAX_BYTES)
                .map(|(_, bytes)| round_up(*bytes).max(8))
                .sum();
            prop_assert_eq!(stats.pooled_bytes_in_use, pooled);
        }

        // Live blocks never overlap
        let mut ranges = BTreeMap::new();
        for (ptr, bytes) in &live {
            let span = if *bytes <= MAX_BYTES { round_up(*bytes).max(8) } else { *bytes };
            ranges.insert(ptr.as_ptr() as usize, span);
        }
        prop_assert_eq!(ranges.len(), live.len());
        let mut end = 0;
        for (start, span) in ranges {
            prop_assert!(start >= end);
            end = start + span;
        }

        for (ptr, bytes) in live {
            unsafe { pool.deallocate(ptr, bytes) };
        }
        prop_assert_eq!(pool.used_bytes(), 0);
        prop_assert_eq!(pool.stats().oversized_bytes_in_use, 0);
    }

    #[test]
    fn growth_requests_are_reproducible(sizes in prop::collection::vec(1..=MAX_BYTES, 1..200)) {
        let run = |sizes: &[usize]| {
            let mut pool = PoolAllocator::new(SystemHeap);
            let mut heap_sizes = Vec::new();
            for &bytes in sizes {
                pool.allocate(bytes).unwrap();
                heap_sizes.push(pool.heap_size());
            }
            heap_sizes
        };
        prop_assert_eq!(run(&sizes), run(&sizes));
    }

    #[test]
    fn refill_serves_a_full_batch(bytes in 1..=MAX_BYTES) {
        let mut pool = PoolAllocator::new(SystemHeap);
        pool.allocate(bytes).unwrap();
        let heap_size = pool.heap_size();
        for _ in 0..NOBJS - 1 {
            pool.allocate(bytes).unwrap();
        }
        prop_assert_eq!(pool.heap_size(), heap_size);
        prop_assert_eq!(pool.stats().growths, 1);
    }
}
