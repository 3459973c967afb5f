use std::{
    fmt, mem, ptr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Condvar, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use log::trace;

use super::node::{Chain, Node, NodePtr};
use crate::{sync, ConcurrentQueue, Handle, SyncQueue};

type End<'a, T> = MutexGuard<'a, NodePtr<T>>;

/// An unbounded FIFO queue over a singly linked list with separate head and
/// tail locks.
///
/// The list always ends in a dummy node without data. Producers only take the
/// tail lock to fill the dummy and append a fresh one; consumers only take the
/// head lock (plus a short peek at the tail to detect emptiness). Whenever
/// both locks of a queue are needed, head is locked before tail.
pub struct FineQueue<T> {
    head: Mutex<NodePtr<T>>,
    tail: Mutex<NodePtr<T>>,
    not_empty: Condvar,
    // Consumers parked (or about to park) on `not_empty`.
    sleepers: AtomicUsize,
}

impl<T> FineQueue<T> {
    pub fn new() -> Self {
        Self::from_chain(Chain::new())
    }

    fn from_chain(chain: Chain<T>) -> Self {
        let (head, tail) = chain.into_ends();
        Self {
            head: Mutex::new(head),
            tail: Mutex::new(tail),
            not_empty: Condvar::new(),
            sleepers: AtomicUsize::new(0),
        }
    }

    /// Appends `value` at the back of the queue.
    ///
    /// The new dummy node is allocated before the tail lock is taken, so the
    /// critical section is two pointer writes.
    pub fn push(&self, value: T) {
        let dummy = Node::dummy();
        {
            let mut tail = sync::lock(&self.tail);
            unsafe { Node::fill(&mut *tail, value, dummy) };
        }
        self.wake_sleeper();
    }

    /// Removes the front element, or returns `None` right away if the queue is
    /// empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut head = sync::lock(&self.head);
        if *head == self.tail() {
            return None;
        }
        Some(unsafe { take_head(&mut *head) })
    }

    /// Removes the front element, blocking until one is available.
    pub fn wait_and_pop(&self) -> T {
        let mut head = self.sleep_on_head(|head| {
            self.not_empty
                .wait_while(head, |head| *head == self.tail())
                .unwrap_or_else(PoisonError::into_inner)
        });
        unsafe { take_head(&mut *head) }
    }

    /// Like [`wait_and_pop`](Self::wait_and_pop), but gives up after `timeout`.
    pub fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut head = self.sleep_on_head(|head| {
            let (head, result) = self
                .not_empty
                .wait_timeout_while(head, timeout, |head| *head == self.tail())
                .unwrap_or_else(PoisonError::into_inner);
            (!result.timed_out()).then_some(head)
        })?;
        Some(unsafe { take_head(&mut *head) })
    }

    /// Counts the elements between head and tail.
    ///
    /// Only the head lock is held while walking, so elements pushed during
    /// the walk may be counted too. The result is a hint, not a snapshot.
    pub fn len(&self) -> usize {
        let head = sync::lock(&self.head);
        let mut length = 0;
        let mut cursor = *head;
        while cursor != self.tail() {
            length += 1;
            cursor = cursor.successor();
        }
        length
    }

    pub fn is_empty(&self) -> bool {
        *sync::lock(&self.head) == self.tail()
    }

    /// Exchanges the contents of the two queues and wakes the consumers of
    /// both.
    ///
    /// All four locks are held for the exchange, acquired in a fixed order
    /// across the two instances.
    pub fn swap(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        {
            let ((mut head, mut tail), (mut other_head, mut other_tail)) =
                sync::lock_in_order(self, other, Self::lock_ends);
            mem::swap(&mut *head, &mut *other_head);
            mem::swap(&mut *tail, &mut *other_tail);
        }
        trace!("swapped fine queues");
        self.not_empty.notify_all();
        other.not_empty.notify_all();
    }

    /// Replaces the contents with the list of `other`, which is consumed.
    pub fn replace_with(&self, mut other: Self) {
        let other_head = other.head.get_mut().unwrap_or_else(PoisonError::into_inner);
        let other_tail = other.tail.get_mut().unwrap_or_else(PoisonError::into_inner);
        {
            let (mut head, mut tail) = self.lock_ends();
            mem::swap(&mut *head, other_head);
            mem::swap(&mut *tail, other_tail);
        }
        trace!("replaced fine queue contents");
        self.not_empty.notify_all();
    }

    fn tail(&self) -> NodePtr<T> {
        *sync::lock(&self.tail)
    }

    fn lock_ends(&self) -> (End<'_, T>, End<'_, T>) {
        let head = sync::lock(&self.head);
        let tail = sync::lock(&self.tail);
        (head, tail)
    }

    fn install(&self, mut chain: Chain<T>) {
        {
            let (mut head, mut tail) = self.lock_ends();
            mem::swap(&mut *head, &mut chain.head);
            mem::swap(&mut *tail, &mut chain.tail);
        }
        self.not_empty.notify_all();
        // The old list is freed with `chain`, after the locks are released.
    }

    /// Runs `wait` on the head guard while registered as a sleeper, so that
    /// producers know they have to signal.
    fn sleep_on_head<'a, R>(&'a self, wait: impl FnOnce(End<'a, T>) -> R) -> R {
        let head = sync::lock(&self.head);
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        let woken = wait(head);
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
        woken
    }

    fn wake_sleeper(&self) {
        // A consumer registers before it looks at the tail, and looking at the
        // tail needs the tail lock we just released. So either it saw our
        // element, or we see its registration here.
        if self.sleepers.load(Ordering::SeqCst) > 0 {
            let _head = sync::lock(&self.head);
            self.not_empty.notify_one();
        }
    }
}

impl<T: Clone> FineQueue<T> {
    /// Overwrites the contents with a copy of `other`, waking this queue's
    /// consumers.
    ///
    /// The copy is built while holding only `other`'s head lock, and installed
    /// afterwards under both of this queue's locks. The two queues are never
    /// locked at the same time.
    pub fn assign_from(&self, other: &Self) {
        if ptr::eq(self, other) {
            return;
        }
        self.install(other.copy_chain());
        trace!("assigned fine queue");
    }

    // The queue may grow while we walk it, but it cannot shrink: popping needs
    // the head lock we hold.
    fn copy_chain(&self) -> Chain<T> {
        let mut chain = Chain::new();
        let head = sync::lock(&self.head);
        let mut cursor = *head;
        while cursor != self.tail() {
            if let Some(value) = &cursor.data {
                chain.append(value.clone());
            }
            cursor = cursor.successor();
        }
        chain
    }
}

/// Unlinks the head node and returns its element.
///
/// # Safety
///
/// `head` must come from a locked head guard and must differ from the tail,
/// i.e. the queue is non-empty.
unsafe fn take_head<T>(head: &mut NodePtr<T>) -> T {
    let node = head.free();
    *head = node.next.expect("non-tail node without successor");
    node.data.expect("non-tail node without data")
}

impl<T> Drop for FineQueue<T> {
    fn drop(&mut self) {
        let head = *self.head.get_mut().unwrap_or_else(PoisonError::into_inner);
        unsafe { head.free_chain() };
    }
}

impl<T> Default for FineQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for FineQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut chain = Chain::new();
        for value in iter {
            chain.append(value);
        }
        Self::from_chain(chain)
    }
}

impl<T, const N: usize> From<[T; N]> for FineQueue<T> {
    fn from(items: [T; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<T> From<Vec<T>> for FineQueue<T> {
    fn from(items: Vec<T>) -> Self {
        items.into_iter().collect()
    }
}

impl<T: Clone> Clone for FineQueue<T> {
    fn clone(&self) -> Self {
        Self::from_chain(self.copy_chain())
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign_from(source);
    }
}

impl<T: PartialEq> PartialEq for FineQueue<T> {
    fn eq(&self, other: &Self) -> bool {
        if ptr::eq(self, other) {
            let (head, tail) = self.lock_ends();
            return lists_equal((*head, *tail), (*head, *tail));
        }
        let ((head, tail), (other_head, other_tail)) =
            sync::lock_in_order(self, other, Self::lock_ends);
        lists_equal((*head, *tail), (*other_head, *other_tail))
    }
}

impl<T: Eq> Eq for FineQueue<T> {}

// Both lists must be locked at both ends by the caller.
fn lists_equal<T: PartialEq>(
    (mut one, one_tail): (NodePtr<T>, NodePtr<T>),
    (mut other, other_tail): (NodePtr<T>, NodePtr<T>),
) -> bool {
    while one != one_tail && other != other_tail {
        if one.data != other.data {
            return false;
        }
        one = one.successor();
        other = other.successor();
    }
    one == one_tail && other == other_tail
}

impl<T: fmt::Debug> fmt::Debug for FineQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = sync::lock(&self.head);
        let mut list = f.debug_list();
        let mut cursor = *head;
        while cursor != self.tail() {
            if let Some(value) = &cursor.data {
                list.entry(value);
            }
            cursor = cursor.successor();
        }
        list.finish()
    }
}

impl<T> SyncQueue<T> for FineQueue<T> {
    fn push(&self, value: T) {
        FineQueue::push(self, value)
    }

    fn try_pop(&self) -> Option<T> {
        FineQueue::try_pop(self)
    }

    fn wait_and_pop(&self) -> T {
        FineQueue::wait_and_pop(self)
    }

    fn wait_and_pop_timeout(&self, timeout: Duration) -> Option<T> {
        FineQueue::wait_and_pop_timeout(self, timeout)
    }

    fn len(&self) -> usize {
        FineQueue::len(self)
    }

    fn is_empty(&self) -> bool {
        FineQueue::is_empty(self)
    }

    fn swap(&self, other: &Self) {
        FineQueue::swap(self, other)
    }

    fn assign_from(&self, other: &Self)
    where
        T: Clone,
    {
        FineQueue::assign_from(self, other)
    }

    fn replace_with(&self, other: Self) {
        FineQueue::replace_with(self, other)
    }
}

pub struct FineQueueHandle<'q, T> {
    queue: &'q FineQueue<T>,
}

impl<T> Handle<T> for FineQueueHandle<'_, T> {
    fn enqueue(&mut self, item: T) {
        self.queue.push(item);
    }

    fn dequeue(&mut self) -> Option<T> {
        self.queue.try_pop()
    }
}

impl<T> ConcurrentQueue<T> for FineQueue<T> {
    fn register(&self) -> impl Handle<T> {
        FineQueueHandle { queue: self }
    }
}
