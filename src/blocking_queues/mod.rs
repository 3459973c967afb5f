//! The two lock-based queue designs.
//!
//! | queue | locks | push vs. pop |
//! |-------|-------|--------------|
//! | [`CoarseQueue`] | one mutex over a `VecDeque` | serialized |
//! | [`FineQueue`] | head mutex + tail mutex over a linked list | parallel |
//!
//! Both implement [`SyncQueue`](crate::SyncQueue) and can be swapped for one
//! another.

pub mod coarse_queue;
pub mod fine_queue;
mod node;

pub use coarse_queue::CoarseQueue;
pub use fine_queue::FineQueue;


#[cfg(test)]
mod proptests;
