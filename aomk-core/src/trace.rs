use core::cell::Cell;
use critical_section::Mutex;

use crate::Priority;

/// State transitions the core emits from the scheduler, the queue, the
/// pool, and the timer engine. An application can override the sink with
/// [`set_hook`]; absent that, a `log`-enabled build forwards every event to
/// `log::trace!` and a plain `no_std` build drops them on the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEvent {
    /// An active object was handed the CPU and began draining its queue.
    AoActivated(Priority),
    /// An active object's queue ran dry and it gave the CPU back.
    AoDeactivated(Priority),
    /// A message was copied into some active object's queue.
    MessagePut,
    /// A `put` found no free slot; the message was dropped.
    MessageQueueFull,
    /// The pool handed out a block of this many bytes.
    PoolAllocated(usize),
    /// A pool allocation request found no free, aligned run of blocks.
    PoolExhausted(usize),
    /// A block of this many bytes was returned to the pool.
    PoolFreed(usize),
    /// A timed event was armed (or re-armed after having fired).
    TimerArmed,
    /// A timed event reached zero and posted its message.
    TimerFired,
    /// A timed event was removed from the engine's armed list.
    TimerDisarmed,
}

#[cfg(feature = "defmt")]
impl defmt::Format for TraceEvent {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TraceEvent::AoActivated(p) => defmt::write!(fmt, "AoActivated({})", p),
            TraceEvent::AoDeactivated(p) => defmt::write!(fmt, "AoDeactivated({})", p),
            TraceEvent::MessagePut => defmt::write!(fmt, "MessagePut"),
            TraceEvent::MessageQueueFull => defmt::write!(fmt, "MessageQueueFull"),
            TraceEvent::PoolAllocated(n) => defmt::write!(fmt, "PoolAllocated({=usize})", n),
            TraceEvent::PoolExhausted(n) => defmt::write!(fmt, "PoolExhausted({=usize})", n),
            TraceEvent::PoolFreed(n) => defmt::write!(fmt, "PoolFreed({=usize})", n),
            TraceEvent::TimerArmed => defmt::write!(fmt, "TimerArmed"),
            TraceEvent::TimerFired => defmt::write!(fmt, "TimerFired"),
            TraceEvent::TimerDisarmed => defmt::write!(fmt, "TimerDisarmed"),
        }
    }
}

/// A trace hook: a plain function pointer, not a closure, so it costs
/// nothing to store in a `static` and copy out of the lock before calling.
pub type Hook = fn(TraceEvent);

static HOOK: Mutex<Cell<Option<Hook>>> = Mutex::new(Cell::new(None));

/// Installs the process-wide trace hook, replacing whatever was there
/// before. Pass `None` to go back to tracing nothing.
pub fn set_hook(hook: Option<Hook>) {
    critical_section::with(|cs| HOOK.borrow(cs).set(hook));
}

/// Calls the installed hook, if any, with `event`. Every call site reads
/// the hook inside its own short critical section and invokes it outside —
/// the same put-inside/act-outside shape [`crate`]'s callers use for every
/// other cross-crate side effect, so this never nests one critical section
/// inside another.
///
/// With no hook installed, this falls back to [`default_sink`], which on a
/// `log`-enabled build forwards to `log::trace!` and is otherwise a no-op —
/// tracing an application never wired up costs one `Option<fn>` load and a
/// branch.
pub fn emit(event: TraceEvent) {
    let hook = critical_section::with(|cs| HOOK.borrow(cs).get());
    match hook {
        Some(hook) => hook(event),
        None => default_sink(event),
    }
}

#[cfg(feature = "log")]
fn default_sink(event: TraceEvent) {
    log::trace!("{:?}", event);
}

#[cfg(not(feature = "log"))]
fn default_sink(_event: TraceEvent) {}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    static TEST_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());
    static SEEN: AtomicU32 = AtomicU32::new(0);

    fn bump(_event: TraceEvent) {
        SEEN.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    #[cfg(not(feature = "log"))]
    fn emit_is_a_no_op_with_no_hook_installed_and_no_log_bridge() {
        let _guard = TEST_GUARD.lock().unwrap_or_else(|p| p.into_inner());
        set_hook(None);
        SEEN.store(0, Ordering::SeqCst);
        emit(TraceEvent::MessagePut);
        assert_eq!(SEEN.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn installed_hook_observes_every_emit() {
        let _guard = TEST_GUARD.lock().unwrap_or_else(|p| p.into_inner());
        SEEN.store(0, Ordering::SeqCst);
        set_hook(Some(bump));
        emit(TraceEvent::AoActivated(Priority::new(3)));
        emit(TraceEvent::AoDeactivated(Priority::new(3)));
        assert_eq!(SEEN.load(Ordering::SeqCst), 2);
        set_hook(None);
    }
}
