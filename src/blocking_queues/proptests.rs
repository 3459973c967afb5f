//! Property-based tests for the blocking queues using proptest
//!
//! Single-threaded properties are checked against a `VecDeque` model;
//! concurrent ones check conservation of elements.

use std::{collections::VecDeque, sync::Mutex, thread};

use proptest::prelude::*;

use super::{CoarseQueue, FineQueue};
use crate::SyncQueue;

#[derive(Clone, Debug)]
enum Op {
    Push(i32),
    Pop,
    Len,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<i32>().prop_map(Op::Push),
        2 => Just(Op::Pop),
        1 => Just(Op::Len),
    ]
}

fn follows_model<Q: SyncQueue<i32>>(queue: &Q, ops: &[Op]) -> Result<(), TestCaseError> {
    let mut model = VecDeque::new();
    for op in ops {
        match op {
            Op::Push(value) => {
                queue.push(*value);
                model.push_back(*value);
            }
            Op::Pop => {
                prop_assert_eq!(queue.try_pop(), model.pop_front());
            }
            Op::Len => {
                prop_assert_eq!(queue.len(), model.len());
                prop_assert_eq!(queue.is_empty(), model.is_empty());
            }
        }
    }
    Ok(())
}

fn conserves_elements<Q: SyncQueue<u32> + Sync>(
    queue: &Q,
    producers: u32,
    per_producer: u32,
    pops_per_consumer: usize,
) -> Result<(), TestCaseError> {
    let popped = Mutex::new(Vec::new());
    thread::scope(|s| {
        for c in 0..producers {
            s.spawn(move || {
                for i in (c * per_producer)..((c + 1) * per_producer) {
                    queue.push(i);
                }
            });
        }
        for _ in 0..2 {
            s.spawn(|| {
                let local: Vec<u32> = (0..pops_per_consumer)
                    .filter_map(|_| queue.try_pop())
                    .collect();
                popped.lock().unwrap().extend(local);
            });
        }
    });
    let mut all = popped.into_inner().unwrap();
    let consumed = all.len();
    let remaining = queue.len();
    while let Some(value) = queue.try_pop() {
        all.push(value);
    }
    prop_assert_eq!(consumed + remaining, (producers * per_producer) as usize);
    all.sort_unstable();
    prop_assert_eq!(all, (0..producers * per_producer).collect::<Vec<_>>());
    Ok(())
}

proptest! {
    #[test]
    fn coarse_queue_follows_model(ops in prop::collection::vec(op(), 0..200)) {
        follows_model(&CoarseQueue::new(), &ops)?;
    }

    #[test]
    fn fine_queue_follows_model(ops in prop::collection::vec(op(), 0..200)) {
        follows_model(&FineQueue::new(), &ops)?;
    }

    #[test]
    fn fifo_when_pushes_finish_before_pops(values in prop::collection::vec(any::<i32>(), 0..100)) {
        let coarse = CoarseQueue::new();
        let fine = FineQueue::new();
        for &value in &values {
            coarse.push(value);
            fine.push(value);
        }
        let from_coarse: Vec<i32> = std::iter::from_fn(|| coarse.try_pop()).collect();
        let from_fine: Vec<i32> = std::iter::from_fn(|| fine.try_pop()).collect();
        prop_assert_eq!(&from_coarse, &values);
        prop_assert_eq!(&from_fine, &values);
    }

    #[test]
    fn equality_matches_sequence_equality(
        left in prop::collection::vec(0..4i32, 0..6),
        right in prop::collection::vec(0..4i32, 0..6),
    ) {
        let expected = left == right;
        prop_assert_eq!(CoarseQueue::from(left.clone()) == CoarseQueue::from(right.clone()), expected);
        prop_assert_eq!(FineQueue::from(right.clone()) == FineQueue::from(left.clone()), expected);
        prop_assert_eq!(FineQueue::from(left.clone()).len(), left.len());
    }

    #[test]
    fn swap_and_assign_match_sequences(
        left in prop::collection::vec(any::<i32>(), 0..20),
        right in prop::collection::vec(any::<i32>(), 0..20),
    ) {
        let a = FineQueue::from(left.clone());
        let b = FineQueue::from(right.clone());
        a.swap(&b);
        prop_assert_eq!(&a, &FineQueue::from(right.clone()));
        prop_assert_eq!(&b, &FineQueue::from(left.clone()));
        let c = CoarseQueue::from(left.clone());
        let d = CoarseQueue::from(right.clone());
        c.swap(&d);
        prop_assert_eq!(&c, &CoarseQueue::from(right));
        d.assign_from(&c);
        prop_assert_eq!(&d, &c);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn coarse_queue_conserves_elements(
        producers in 1u32..4,
        per_producer in 1u32..300,
        pops in 0usize..400,
    ) {
        conserves_elements(&CoarseQueue::new(), producers, per_producer, pops)?;
    }

    #[test]
    fn fine_queue_conserves_elements(
        producers in 1u32..4,
        per_producer in 1u32..300,
        pops in 0usize..400,
    ) {
        conserves_elements(&FineQueue::new(), producers, per_producer, pops)?;
    }
}
