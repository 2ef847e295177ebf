//! The active-object trait and its generic, typed-queue implementation.

use core::cell::RefCell;
use critical_section::Mutex;

use aomk_core::{KernelError, KernelResult, Message, Priority};
use aomk_queue::MessageQueue;

/// Lifecycle state of an active object. Corresponds to `AO_ACTIVE` /
/// `AO_READY` / `AO_WAITING` in the reference kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AoState {
    /// Currently draining its queue; the scheduler published its priority
    /// into `current_prio`.
    Active,
    /// Linked into the ready list, waiting for the scheduler to reach it.
    Ready,
    /// Not linked anywhere; its queue is empty (or hasn't been readied yet).
    Waiting,
}

#[cfg(feature = "defmt")]
impl defmt::Format for AoState {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            AoState::Active => defmt::write!(fmt, "Active"),
            AoState::Ready => defmt::write!(fmt, "Ready"),
            AoState::Waiting => defmt::write!(fmt, "Waiting"),
        }
    }
}

/// Object-safe face of an active object, so the kernel's registry can hold a
/// fixed-size array of heterogeneous active objects (each with its own
/// message type) behind `&'static dyn ActiveObject` — the same shape the
/// reference kernel's registry uses for `dyn QActive`.
///
/// Every method takes `&self`: an `Active<M, QLEN>` keeps its mutable state
/// behind a `critical_section::Mutex<RefCell<_>>` internally, the same
/// interior-mutability pattern [`aomk_mem::MemoryPool`] uses. That's what
/// lets the registry and the ready list both hold a shared reference to the
/// same active object without fighting the borrow checker over who owns the
/// one `&mut` a plain struct would require.
pub trait ActiveObject: Sync {
    /// Registry slot this active object occupies, distinct from its
    /// [`Priority`] — two active objects may share a priority, but never an
    /// id. Corresponds to the reference kernel's `ActiveObject_t::id`.
    fn id(&self) -> u8;
    fn priority(&self) -> Priority;
    fn state(&self) -> AoState;
    fn set_state(&self, state: AoState);
    fn queue_is_empty(&self) -> bool;

    /// Dequeues exactly one message and runs the handler on it to
    /// completion. Precondition: `!queue_is_empty()`.
    fn dispatch_one(&self);
}

struct ActiveState<M: Message, const QLEN: usize> {
    state: AoState,
    queue: MessageQueue<M, QLEN>,
}

/// A concrete active object: a fixed id and priority, a bounded queue of
/// message type `M`, and a run-to-completion handler. Corresponds to
/// `ActiveObject_t` plus its owned `MessageQueue_t` in the reference kernel;
/// generalized from a `void*` handler signature to a typed `fn(M)`.
pub struct Active<M: Message, const QLEN: usize> {
    id: u8,
    priority: Priority,
    handler: fn(M),
    inner: Mutex<RefCell<ActiveState<M, QLEN>>>,
}

impl<M: Message, const QLEN: usize> Active<M, QLEN> {
    /// Builds an active object at registry slot `id` and priority
    /// `priority`. `id` and `priority` are independent: two active objects
    /// may be created at the same `priority` (they run in arrival order
    /// whenever both are ready), but each needs its own `id`. It still
    /// needs to be registered with the kernel (see
    /// [`crate::active_object_create`]) before it can be posted to.
    pub const fn new(id: u8, priority: Priority, handler: fn(M)) -> Self {
        Active {
            id,
            priority,
            handler,
            inner: Mutex::new(RefCell::new(ActiveState {
                state: AoState::Waiting,
                queue: MessageQueue::new(),
            })),
        }
    }

    /// Copies `msg` into this object's queue and, on success, readies it
    /// with the kernel. Mirrors `MsgQueuePut`: the put and the
    /// `SchedulerAddReady` call are both issued from inside one critical
    /// section so a concurrent ISR post can't interleave between them.
    pub fn post(&'static self, msg: M) -> KernelResult<()> {
        if !crate::scheduler::is_initialized() {
            return Err(KernelError::Uninitialized);
        }
        match critical_section::with(|cs| self.inner.borrow_ref_mut(cs).queue.put(msg)) {
            Ok(_) => {
                crate::scheduler::add_ready(self.id);
                aomk_core::trace::emit(aomk_core::TraceEvent::MessagePut);
                Ok(())
            }
            Err(err) => {
                aomk_core::trace::emit(aomk_core::TraceEvent::MessageQueueFull);
                Err(err)
            }
        }
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow_ref(cs).queue.len())
    }

    pub fn is_empty(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).queue.is_empty())
    }
}

impl<M: Message, const QLEN: usize> ActiveObject for Active<M, QLEN> {
    fn id(&self) -> u8 {
        self.id
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn state(&self) -> AoState {
        critical_section::with(|cs| self.inner.borrow_ref(cs).state)
    }

    fn set_state(&self, state: AoState) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).state = state);
    }

    fn queue_is_empty(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).queue.is_empty())
    }

    fn dispatch_one(&self) {
        let msg = critical_section::with(|cs| {
            let mut state = self.inner.borrow_ref_mut(cs);
            debug_assert!(!state.queue.is_empty(), "dispatch_one called on an empty queue");
            state.queue.get()
        });
        (self.handler)(msg);
    }
}
