//! Third-party concurrent queues wired into [`ConcurrentQueue`](crate::ConcurrentQueue),
//! so the benchmark can compare them against the lock-based queues.
//!
//! None of them needs per-thread state, so a handle is just a borrow of the
//! queue.

use crossbeam_queue::SegQueue;
use lockfree::queue::Queue as LockfreeQueue;

use crate::{ConcurrentQueue, Handle};

type SmolQueue<T> = ::concurrent_queue::ConcurrentQueue<T>;

/// A handle that forwards to the shared queue it borrows.
pub struct Borrowed<'q, Q> {
    queue: &'q Q,
}

macro_rules! baseline_queue {
    ($queue:ident, |$q:ident, $item:ident| $enqueue:expr, |$p:ident| $dequeue:expr) => {
        impl<T> ConcurrentQueue<T> for $queue<T> {
            fn register(&self) -> impl Handle<T> {
                Borrowed { queue: self }
            }
        }

        impl<T> Handle<T> for Borrowed<'_, $queue<T>> {
            fn enqueue(&mut self, $item: T) {
                let $q = self.queue;
                $enqueue
            }

            fn dequeue(&mut self) -> Option<T> {
                let $p = self.queue;
                $dequeue
            }
        }
    };
}

baseline_queue!(SegQueue, |q, item| q.push(item), |q| q.pop());
baseline_queue!(LockfreeQueue, |q, item| q.push(item), |q| q.pop());
// Pushing only fails on a closed queue, and the benchmark never closes it.
baseline_queue!(SmolQueue, |q, item| { let _ = q.push(item); }, |q| q.pop().ok());
