#![no_std]
#![forbid(unsafe_code)]

//! Per-active-object bounded message queue.
//!
//! A FIFO ring buffer of fixed capacity, one per active object. `put` is the
//! only side the scheduler cares about being ISR-safe: interrupts and
//! thread-context code both post into the same queue, so the caller wraps
//! `put` in a critical section. `get` is only ever called by the activator
//! while its owning active object is `ACTIVE`, so it never races with
//! itself.

use heapless::Deque;

use aomk_core::{KernelError, KernelResult, Message};

/// Status returned by [`MessageQueue::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStatus {
    /// The message was enqueued.
    Enqueued,
}

/// A bounded FIFO queue of messages of a single concrete type `M`, with
/// compile-time capacity `N`. Corresponds to `MessageQueue_t` in the
/// reference kernel, generalized from an untyped byte-slot buffer backed by
/// explicit head/tail/`is_full` bookkeeping to a typed ring buffer — Rust's
/// generics let every slot stay `M` end to end, so the head/tail/`is_full`
/// disambiguation collapses into [`heapless::Deque`]'s own bookkeeping
/// without losing any of its invariants (FIFO order, exact capacity, O(1)
/// push/pop).
pub struct MessageQueue<M: Message, const N: usize> {
    queue: Deque<M, N>,
}

impl<M: Message, const N: usize> MessageQueue<M, N> {
    /// An empty queue of capacity `N`.
    pub const fn new() -> Self {
        MessageQueue { queue: Deque::new() }
    }

    /// True iff `get` would have nothing to return.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// True iff the next `put` would return [`KernelError::QueueFull`].
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Compile-time capacity of the queue.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Copies `msg` into the back of the queue. Returns
    /// [`KernelError::QueueFull`] without side effects when the queue has no
    /// free slot — the message is dropped and the caller decides policy.
    ///
    /// Does not itself notify the scheduler; the active-object runtime calls
    /// this from inside a critical section and follows a successful put with
    /// `SchedulerAddReady`, matching the reference kernel's `MsgQueuePut`.
    pub fn put(&mut self, msg: M) -> KernelResult<PutStatus> {
        self.queue
            .push_back(msg)
            .map(|()| PutStatus::Enqueued)
            .map_err(|_| KernelError::QueueFull)
    }

    /// Removes and returns the oldest queued message.
    ///
    /// Precondition: the queue is non-empty. By construction the activator
    /// only calls this after [`MessageQueue::is_empty`] returned `false`;
    /// violating that precondition is a programmer error (spec's error
    /// category 2), so this asserts rather than returning a `Result`.
    pub fn get(&mut self) -> M {
        debug_assert!(!self.is_empty(), "MessageQueue::get called on an empty queue");
        self.queue.pop_front().expect("checked non-empty above")
    }
}

impl<M: Message, const N: usize> Default for MessageQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
