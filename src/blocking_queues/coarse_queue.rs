use std::{
    collections::VecDeque,
    fmt, mem, ptr,
    sync::{Condvar, Mutex, PoisonError},
    time::Duration,
};

use log::trace;

use crate::{sync, ConcurrentQueue, Handle, SyncQueue};

/// An unbounded FIFO queue guarded by a single lock.
///
/// Every operation takes the same mutex, so producers and consumers are fully
/// serialized against each other. See [`FineQueue`](super::FineQueue) for a
/// variant that lets a push and a pop proceed in parallel.
pub struct CoarseQueue<T> {
    storage: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> CoarseQueue<T> {
    pub fn new() -> Self {
        Self::with_storage(VecDeque::new())
    }

    fn with_storage(storage: VecDeque<T>) -> Self {
        Self {
            storage: Mutex::new(storage),
            not_empty: Condvar::new(),
        }
    }

    /// Appends `value` at the back of the queue and wakes one waiting consumer.
    pub fn push(&self, value: T) {
        sync::lock(&self.storage).push_back(value);
        self.not_empty.notify_one();
    }

    /// Removes the front element, or returns `None` right away if the queue is
    /// empty.
    pub fn try_pop(&self) -> Option<T> {
        sync::lock(&self.storage).pop_front()
    }

    /// Removes the front element, blocking until one is available.
    pub fn wait_and_pop(&self) -> T {
        let storage = sync::lock(&self.storage);
        let mut storage = self
            .not_empty
            .wait_while(storage, |storage| storage.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        storage
            .pop_front()
            .expect("woken with an empty queue")
    }

    /// Like [`wait_and_pop`](Self::wait_and_pop), but gives up after `timeout`.
    pub fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<T> {
        let storage = sync::lock(&self.storage);
        let (mut storage, _) = self
            .not_empty
            .wait_timeout_while(storage, timeout, |storage| storage.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        storage.pop_front()
    }

    /// Number of queued elements. Stale as soon as it returns if other threads
    /// are pushing or popping.
    pub fn len(&self) -> usize {
        sync::lock(&self.storage).len()
    }

    pub fn is_empty(&self) -> bool {
        sync::lock(&self.storage).is_empty()
    }

    /// Exchanges the contents of the two queues and wakes the consumers of
    /// both.
    pub fn swap(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        {
            let (mut mine, mut theirs) =
                sync::lock_in_order(self, other, |queue| sync::lock(&queue.storage));
            mem::swap(&mut *mine, &mut *theirs);
            trace!(
                "swapped coarse queues, now holding {} and {} elements",
                mine.len(),
                theirs.len()
            );
        }
        self.not_empty.notify_all();
        other.not_empty.notify_all();
    }

    /// Replaces the contents with the storage of `other`, which is consumed.
    ///
    /// Only this queue is locked: owning `other` means nobody else can touch
    /// it.
    pub fn replace_with(&self, mut other: Self) {
        let incoming = other
            .storage
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        {
            let mut storage = sync::lock(&self.storage);
            mem::swap(&mut *storage, incoming);
            trace!("replaced coarse queue contents, {} elements", storage.len());
        }
        self.not_empty.notify_all();
        // `other` drops the previous contents here, outside the lock.
    }
}

impl<T: Clone> CoarseQueue<T> {
    /// Overwrites the contents with a copy of `other`, waking this queue's
    /// consumers.
    pub fn assign_from(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        {
            let (mut mine, theirs) =
                sync::lock_in_order(self, other, |queue| sync::lock(&queue.storage));
            mine.clone_from(&theirs);
            trace!("assigned coarse queue, {} elements", mine.len());
        }
        self.not_empty.notify_all();
    }
}

impl<T> Default for CoarseQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for CoarseQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::with_storage(iter.into_iter().collect())
    }
}

impl<T, const N: usize> From<[T; N]> for CoarseQueue<T> {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<T> From<Vec<T>> for CoarseQueue<T> {
    fn from(items: Vec<T>) -> Self {
        Self::with_storage(items.into())
    }
}

impl<T: Clone> Clone for CoarseQueue<T> {
    fn clone(&self) -> Self {
        Self::with_storage(sync::lock(&self.storage).clone())
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign_from(source);
    }
}

impl<T: PartialEq> PartialEq for CoarseQueue<T> {
    fn eq(&self, other: &Self) -> bool {
        if ptr::eq(self, other) {
            let storage = sync::lock(&self.storage);
            return *storage == *storage;
        }
        let (mine, theirs) = sync::lock_in_order(self, other, |queue| sync::lock(&queue.storage));
        *mine == *theirs
    }
}

impl<T: Eq> Eq for CoarseQueue<T> {}

impl<T: fmt::Debug> fmt::Debug for CoarseQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(sync::lock(&self.storage).iter())
            .finish()
    }
}

impl<T> SyncQueue<T> for CoarseQueue<T> {
    fn push(&self, value: T) {
        CoarseQueue::push(self, value)
    }

    fn try_pop(&self) -> Option<T> {
        CoarseQueue::try_pop(self)
    }

    fn wait_and_pop(&self) -> T {
        CoarseQueue::wait_and_pop(self)
    }

    fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<T> {
        CoarseQueue::wait_and_pop_timeout(self, timeout)
    }

    fn len(&self) -> usize {
        CoarseQueue::len(self)
    }

    fn is_empty(&self) -> bool {
        CoarseQueue::is_empty(self)
    }

    fn swap(&self, other: &Self) {
        CoarseQueue::swap(self, other)
    }

    fn assign_from(&self, other: &Self)
    where
        T: Clone,
    {
        CoarseQueue::assign_from(self, other)
    }

    fn replace_with(&self, other: Self) {
        CoarseQueue::replace_with(self, other)
    }
}

pub struct CoarseQueueHandle<'q, T> {
    queue: &'q CoarseQueue<T>,
}

impl<T> Handle<T> for CoarseQueueHandle<'_, T> {
    fn enqueue(&mut self, item: T) {
        self.queue.push(item);
    }

    fn dequeue(&mut self) -> Option<T> {
        self.queue.try_pop()
    }
}

impl<T> ConcurrentQueue<T> for CoarseQueue<T> {
    fn register(&self) -> impl Handle<T> {
        CoarseQueueHandle { queue: self }
    }
}

#[cfg(test)]
mod test {
    use std::{sync::mpsc, thread, time::Duration};

    use super::CoarseQueue;
    use crate::{ConcurrentQueue, Handle};

    #[test]
    fn simple_test() {
        let queue = CoarseQueue::new();
        queue.push(5);
        assert_eq!(queue.try_pop(), Some(5));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn size_counts_every_element() {
        let queue = CoarseQueue::from([0, 9, 1, 8, 2, 7, 3, 6, 4, 5]);
        assert_eq!(queue.len(), 10);
        assert!(!queue.is_empty());
    }

    #[test]
    fn emplace_tuples() {
        let queue: CoarseQueue<(char, i32, f64)> = CoarseQueue::new();
        crate::SyncQueue::emplace(&queue, ('a', 1, 1.1));
        assert_eq!(queue, CoarseQueue::from([('a', 1, 1.1)]));
    }

    #[test]
    fn copy_assign_discards_old_contents() {
        let source = CoarseQueue::from([5, 3, 4, 6]);
        let target = CoarseQueue::from([1, 2, 3, 4, 5]);
        target.assign_from(&source);
        assert_eq!(target, source);
        assert_eq!(source.len(), 4);
    }

    #[test]
    fn clone_from_goes_through_assign() {
        let source = CoarseQueue::from([1, 2]);
        let mut target = CoarseQueue::from([9]);
        target.clone_from(&source);
        assert_eq!(target, source);
    }

    #[test]
    fn replace_with_takes_the_donor_storage() {
        let target = CoarseQueue::from([9, 8]);
        target.replace_with(CoarseQueue::from([8, 5, 7, 1]));
        assert_eq!(target, CoarseQueue::from([8, 5, 7, 1]));
    }

    #[test]
    fn debug_lists_elements_front_first() {
        let queue = CoarseQueue::from([1, 2, 3]);
        assert_eq!(format!("{queue:?}"), "[1, 2, 3]");
    }

    #[test]
    fn timeout_expires_on_empty_queue() {
        let queue: CoarseQueue<i32> = CoarseQueue::new();
        assert_eq!(queue.wait_and_pop_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn timeout_returns_value_pushed_in_time() {
        let queue = CoarseQueue::new();
        thread::scope(|s| {
            s.spawn(|| {
                thread::sleep(Duration::from_millis(50));
                queue.push(3);
            });
            assert_eq!(queue.wait_and_pop_timeout(Duration::from_secs(10)), Some(3));
        });
    }

    #[test]
    fn handle_drives_the_queue() {
        let queue = CoarseQueue::new();
        let mut handle = queue.register();
        handle.enqueue(1);
        handle.enqueue(2);
        assert_eq!(handle.dequeue(), Some(1));
        assert_eq!(handle.dequeue(), Some(2));
        assert_eq!(handle.dequeue(), None);
    }

    #[test]
    fn multiple_waiters_are_all_served() {
        let queue = CoarseQueue::new();
        let (tx, rx) = mpsc::channel();
        thread::scope(|s| {
            for _ in 0..4 {
                let tx = tx.clone();
                let queue = &queue;
                s.spawn(move || tx.send(queue.wait_and_pop()).unwrap());
            }
            thread::sleep(Duration::from_millis(50));
            queue.replace_with(CoarseQueue::from([1, 2, 3, 4]));
            let mut received: Vec<i32> = (0..4)
                .map(|_| rx.recv_timeout(Duration::from_secs(10)).unwrap())
                .collect();
            received.sort_unstable();
            assert_eq!(received, vec![1, 2, 3, 4]);
        });
    }
}
