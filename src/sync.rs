use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Queue state is only mutated by code that cannot panic half way, so a
/// poisoned lock still guards a consistent value.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Acquires the locks of two distinct instances in ascending address order and
/// returns the guards in argument order.
///
/// Every cross-instance operation goes through here, so `a.op(&b)` and
/// `b.op(&a)` running at the same time take the locks in the same order.
pub(crate) fn lock_in_order<'a, S, G>(
    one: &'a S,
    other: &'a S,
    lock: impl Fn(&'a S) -> G,
) -> (G, G) {
    debug_assert!(
        !std::ptr::eq(one, other),
        "an instance cannot be locked against itself"
    );
    if (one as *const S) < (other as *const S) {
        let first = lock(one);
        let second = lock(other);
        (first, second)
    } else {
        let second = lock(other);
        let first = lock(one);
        (first, second)
    }
}
