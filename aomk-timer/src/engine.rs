//! The process-wide timed-event engine: a fixed-capacity registry plus the
//! list of currently-armed slot indices. Corresponds to the `timed_events`
//! singly-linked list and `SchedulerProcessTimedEvents` in the reference
//! kernel.
//!
//! The reference list is threaded through the nodes themselves via a `next`
//! pointer, and its removal helper (`RemoveTimedEvent`) nulls out
//! `(*trail)->next->next` before relinking — which corrupts the list when
//! the removed node isn't the tail. Here the "list" is a
//! [`heapless::Vec`] of indices into a fixed registry, the same
//! arena-by-slot approach `aomk-qf`'s ready list uses for active objects;
//! removing a slot is `Vec::remove` on an index, so there's no pointer
//! splice to get wrong.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Vec;

/// Upper bound on the number of distinct timed events the engine can track
/// at once.
pub const MAX_TIMED_EVENTS: usize = 16;

pub(crate) enum TickOutcome {
    StayArmed,
    Unarm,
}

/// Object-safe face of a timed event, so the engine can hold a fixed-size
/// array of heterogeneous events (each posting its own message type) behind
/// `&'static dyn TimedEventObject`.
pub(crate) trait TimedEventObject: Sync {
    fn is_active(&self) -> bool;
    fn engine_slot(&self) -> Option<usize>;
    fn set_engine_slot(&self, slot: usize);
    /// Advances this event by one tick, dispatching if it has reached its
    /// period. Returns whether the event should stay in the armed list.
    fn tick(&self) -> TickOutcome;
}

struct EngineState {
    registry: [Option<&'static dyn TimedEventObject>; MAX_TIMED_EVENTS],
    armed: Vec<usize, MAX_TIMED_EVENTS>,
}

impl EngineState {
    const fn new() -> Self {
        EngineState {
            registry: [None; MAX_TIMED_EVENTS],
            armed: Vec::new(),
        }
    }
}

static ENGINE: Mutex<RefCell<EngineState>> = Mutex::new(RefCell::new(EngineState::new()));

/// Links `event` into the armed list, assigning it a registry slot the
/// first time it's armed. Re-arming an event already in the armed list is a
/// no-op here (the caller has already reset its count/active flag) —
/// the arena-slot guard against the reference kernel's self-chaining
/// hazard when `SchedulerAddTimedEvent` re-arms a node already in the list.
pub(crate) fn add_timed_event(event: &'static dyn TimedEventObject) {
    critical_section::with(|cs| {
        let mut e = ENGINE.borrow_ref_mut(cs);
        // An event's remembered slot is only valid if the registry still
        // holds it there — a test-only full engine reset (or, on a real
        // target, a warm restart that re-inits the engine but not the
        // statics) can leave an event's `slot` field pointing at a registry
        // that's since been cleared. Re-register from scratch when that's
        // detected instead of trusting a stale index.
        let slot = match event.engine_slot() {
            Some(slot) if e.registry[slot].is_some() => slot,
            _ => {
                let slot = e
                    .registry
                    .iter()
                    .position(Option::is_none)
                    .expect("timed event registry full");
                e.registry[slot] = Some(event);
                event.set_engine_slot(slot);
                slot
            }
        };
        if !e.armed.contains(&slot) {
            e.armed.insert(0, slot).expect("timed event registry full");
        }
    });
    aomk_core::trace::emit(aomk_core::TraceEvent::TimerArmed);
}

fn unarm(slot: usize) {
    critical_section::with(|cs| {
        let mut e = ENGINE.borrow_ref_mut(cs);
        if let Some(pos) = e.armed.iter().position(|&s| s == slot) {
            e.armed.remove(pos);
        }
    });
    aomk_core::trace::emit(aomk_core::TraceEvent::TimerDisarmed);
}

/// Walks every currently-armed event once, dispatching any that have
/// reached their period and unarming any that are disabled or were
/// single-shot and just fired. Corresponds to `SchedulerProcessTimedEvents`,
/// called once per `SysTick`.
///
/// The armed list is snapshotted under one critical section and then each
/// event is ticked with the engine lock released, mirroring how
/// `scheduler_activate_ao` drains the ready list without holding the kernel
/// lock across a handler call.
pub fn process_timed_events() {
    let armed: Vec<usize, MAX_TIMED_EVENTS> = critical_section::with(|cs| ENGINE.borrow_ref(cs).armed.clone());

    for slot in armed {
        let event = critical_section::with(|cs| ENGINE.borrow_ref(cs).registry[slot]);
        let Some(event) = event else { continue };

        if !event.is_active() {
            unarm(slot);
            continue;
        }

        match event.tick() {
            TickOutcome::StayArmed => {}
            TickOutcome::Unarm => unarm(slot),
        }
    }
}

/// Number of events currently armed (linked into the list the tick walk
/// traverses).
pub fn armed_count() -> usize {
    critical_section::with(|cs| ENGINE.borrow_ref(cs).armed.len())
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    critical_section::with(|cs| {
        *ENGINE.borrow_ref_mut(cs) = EngineState::new();
    });
}
