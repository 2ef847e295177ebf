//! A single timed event: a destination, a fixed message, a period, and a
//! single-shot/periodic type. Corresponds to `TimedEventSimple_t`.

use core::cell::RefCell;
use critical_section::Mutex;

use aomk_core::Message;
use aomk_qf::Active;

use crate::engine::{self, TickOutcome, TimedEventObject};

/// Whether an event removes itself after firing once, or keeps reloading.
/// Corresponds to `TimedEventType_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedEventKind {
    /// Fires once, then disarms itself.
    Single,
    /// Reloads `count` to 0 and keeps firing every `period` ticks.
    Periodic,
}

#[cfg(feature = "defmt")]
impl defmt::Format for TimedEventKind {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            TimedEventKind::Single => defmt::write!(fmt, "Single"),
            TimedEventKind::Periodic => defmt::write!(fmt, "Periodic"),
        }
    }
}

struct TimedEventState<M: Message> {
    message: M,
    period: u32,
    count: u32,
    kind: TimedEventKind,
    active: bool,
    /// Index into the engine's registry, assigned the first time this event
    /// is armed. `None` until then.
    slot: Option<usize>,
}

/// A node in the timed-event engine. Corresponds to `TimedEventSimple_t`
/// plus the message it carries; generalized from a `void*` payload to a
/// typed `M`, same as [`aomk_qf::Active`].
///
/// Build one as a `'static` and arm it with [`TimedEvent::arm`]. Every
/// accessor goes through a `critical_section::Mutex<RefCell<_>>`, the same
/// interior-mutability shape `Active` and `MemoryPool` use, so the engine
/// can hold a `&'static dyn` reference to it without needing `&mut`.
pub struct TimedEvent<M: Message, const QLEN: usize> {
    dest: &'static Active<M, QLEN>,
    inner: Mutex<RefCell<TimedEventState<M>>>,
}

impl<M: Message, const QLEN: usize> TimedEvent<M, QLEN> {
    /// Builds a disarmed-from-the-engine's-perspective event. Corresponds to
    /// `TimedEventSimpleCreate`; arming it (see [`TimedEvent::arm`]) is a
    /// separate step, matching `SchedulerAddTimedEvent`.
    pub const fn new(dest: &'static Active<M, QLEN>, message: M, period: u32, kind: TimedEventKind) -> Self {
        TimedEvent {
            dest,
            inner: Mutex::new(RefCell::new(TimedEventState {
                message,
                period,
                count: 0,
                kind,
                active: true,
                slot: None,
            })),
        }
    }

    /// Lazily cancels this event: the next tick that observes it removes it
    /// from the engine's armed list instead of ticking it. Corresponds to
    /// `TimedEventDisable`. Idempotent.
    pub fn disable(&self) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).active = false);
    }

    /// Arms (or re-arms) this event: resets `count` to 0, marks it active,
    /// and links it into the engine's armed list if it isn't already there.
    /// Corresponds to `SchedulerAddTimedEvent`.
    pub fn arm(&'static self) {
        critical_section::with(|cs| {
            let mut s = self.inner.borrow_ref_mut(cs);
            s.count = 0;
            s.active = true;
        });
        engine::add_timed_event(self);
    }
}

impl<M: Message, const QLEN: usize> TimedEventObject for TimedEvent<M, QLEN> {
    fn is_active(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).active)
    }

    fn engine_slot(&self) -> Option<usize> {
        critical_section::with(|cs| self.inner.borrow_ref(cs).slot)
    }

    fn set_engine_slot(&self, slot: usize) {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).slot = Some(slot));
    }

    fn tick(&self) -> TickOutcome {
        let (outcome, fired) = critical_section::with(|cs| {
            let mut s = self.inner.borrow_ref_mut(cs);
            if !s.active {
                return (TickOutcome::Unarm, false);
            }
            s.count += 1;
            if s.count >= s.period {
                // A FULL return is silently dropped: best-effort delivery is
                // the whole point of a tick-driven event.
                let _ = self.dest.post(s.message);
                s.count = 0;
                if s.kind == TimedEventKind::Single {
                    s.active = false;
                    return (TickOutcome::Unarm, true);
                }
                return (TickOutcome::StayArmed, true);
            }
            (TickOutcome::StayArmed, false)
        });
        if fired {
            aomk_core::trace::emit(aomk_core::TraceEvent::TimerFired);
        }
        outcome
    }
}
