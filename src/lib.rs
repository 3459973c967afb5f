//! Blocking, unbounded FIFO queues for handing work between threads.
//!
//! Two designs share one contract ([`SyncQueue`]):
//!
//! - [`CoarseQueue`]: a `VecDeque` behind a single mutex and condition
//!   variable. Simple, but every operation is serialized.
//! - [`FineQueue`]: a linked list with separate head and tail locks, so a
//!   producer and a consumer never wait on the same lock.
//!
//! ```
//! use locked_queues::{FineQueue, SyncQueue};
//!
//! let queue = FineQueue::from([8, 13, 62]);
//! assert_eq!(queue.try_pop(), Some(8));
//! assert_eq!(queue.wait_and_pop(), 13);
//! assert_eq!(*queue.try_pop_shared().unwrap(), 62);
//! assert_eq!(queue.try_pop(), None);
//! ```

use std::{sync::Arc, time::Duration};

pub mod baseline_queues;
pub mod blocking_queues;
mod sync;

pub use blocking_queues::{CoarseQueue, FineQueue};

pub trait ConcurrentQueue<T> {
    /// Returns a thread handle to the queue, which can be used for enqueues and dequeues
    fn register(&self) -> impl Handle<T>;
}

pub trait Handle<T> {
    fn enqueue(&mut self, item: T);

    fn dequeue(&mut self) -> Option<T>;
}

/// The contract shared by the blocking queues.
///
/// Whole-queue operations (`swap`, `assign_from`, equality) lock both queues
/// in an order that does not depend on argument order, so `a.swap(&b)` may
/// race `b.swap(&a)` safely. Emptiness is never an error: non-blocking pops
/// return `None` or `false`.
pub trait SyncQueue<T>: Sized {
    /// Appends `value` and wakes a waiting consumer, if any.
    fn push(&self, value: T);

    /// Removes the front element without blocking.
    fn try_pop(&self) -> Option<T>;

    /// Removes the front element, blocking until one is available.
    fn wait_and_pop(&self) -> T;

    /// Removes the front element, blocking for at most `timeout`.
    fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<T>;

    /// Number of elements. Only a hint while other threads use the queue.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool;

    /// Exchanges the contents of `self` and `other`.
    fn swap(&self, other: &Self);

    /// Replaces the contents of `self` with a copy of `other`.
    fn assign_from(&self, other: &Self)
    where
        T: Clone;

    /// Replaces the contents of `self` with those of `other`, consuming it.
    fn replace_with(&self, other: Self);

    /// Pushes an element built from `args`.
    fn emplace<A>(&self, args: A)
    where
        T: From<A>,
    {
        self.push(T::from(args));
    }

    /// Moves the front element into `slot`. Returns `false`, leaving `slot`
    /// untouched, if the queue is empty.
    fn try_pop_into(&self, slot: &mut T) -> bool {
        match self.try_pop() {
            Some(value) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn try_pop_shared(&self) -> Option<Arc<T>> {
        self.try_pop().map(Arc::new)
    }

    fn wait_and_pop_into(&self, slot: &mut T) {
        *slot = self.wait_and_pop();
    }

    fn wait_and_pop_shared(&self) -> Arc<T> {
        Arc::new(self.wait_and_pop())
    }
}
