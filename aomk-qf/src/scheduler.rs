//! The kernel singleton: active-object registry, priority-sorted ready
//! list, and the run-to-completion activation loop.
//!
//! The reference kernel keeps `activated_ao` (a doubly-linked list of
//! active objects) and `os_ptr->current_prio` as free-standing globals,
//! mutated together under one `DISABLE_INTERRUPTS`/`ENABLE_INTERRUPTS`
//! critical section. Here they're fields of one [`KernelState`] behind one
//! `critical_section::Mutex`, so every operation that needs to look at the
//! registry and the ready list together — which is all of them — gets that
//! atomicity for free instead of having to reason about lock ordering
//! between two separate globals.
//!
//! The registry is an arena of active-object slots indexed by each
//! [`ActiveObject::id`], the same arena-by-slot approach
//! [`aomk_timer::engine`]'s armed-event list uses for timed events. An id
//! is just "which registry slot"; priority is a wholly separate axis that
//! two active objects may share, so the ready list carries ids (not
//! priorities) and looks each one's priority up in the registry whenever it
//! needs to compare or reorder.

use core::cell::RefCell;
use critical_section::Mutex;
use heapless::Vec;

use aomk_core::{Hooks, KernelError, KernelResult, Os, Priority, Tick};

use crate::active::{ActiveObject, AoState};

/// Upper bound on the number of active objects the kernel can register.
/// Ids `0..MAX_ACTIVE_OBJECTS` are valid registry slots; priority is
/// unrelated to this bound and may range over the whole
/// [`Priority::HIGHEST`]..=[`Priority::LOWEST`] span regardless of how many
/// active objects exist.
pub const MAX_ACTIVE_OBJECTS: usize = 32;

struct KernelState {
    os: Os,
    initialized: bool,
    registry: [Option<&'static dyn ActiveObject>; MAX_ACTIVE_OBJECTS],
    /// Ids of ready active objects, kept sorted by priority ascending with
    /// equal-priority ids in arrival order — the FIFO-among-siblings
    /// guarantee `add_ready`'s insertion point preserves.
    ready: Vec<u8, MAX_ACTIVE_OBJECTS>,
    current: Priority,
}

impl KernelState {
    const fn new() -> Self {
        const NONE: Option<&'static dyn ActiveObject> = None;
        KernelState {
            os: Os::new(Hooks { on_init: None, on_idle: None, on_tick: None }),
            initialized: false,
            registry: [NONE; MAX_ACTIVE_OBJECTS],
            ready: Vec::new(),
            current: Priority::NONE,
        }
    }
}

static KERNEL: Mutex<RefCell<KernelState>> = Mutex::new(RefCell::new(KernelState::new()));

/// Installs the application's callbacks, marks the kernel initialized, and
/// runs `on_init` once. Corresponds to `KernelInit`; calls made before this
/// one — `active_object_create`, `Active::post` — fail with
/// [`KernelError::Uninitialized`] instead of touching a registry that may
/// still hold a previous run's stale entries.
pub fn kernel_init(hooks: Hooks) {
    critical_section::with(|cs| {
        let mut k = KERNEL.borrow_ref_mut(cs);
        k.os.set_hooks(hooks);
        k.initialized = true;
    });
    if let Some(on_init) = hooks.on_init {
        on_init();
    }
}

pub(crate) fn is_initialized() -> bool {
    critical_section::with(|cs| KERNEL.borrow_ref(cs).initialized)
}

/// Registers `ao` in its own id's registry slot. Corresponds to
/// `ActiveObjectCreate`, which takes `id` as a parameter distinct from
/// `priority` in the reference kernel.
pub fn active_object_create(ao: &'static dyn ActiveObject) -> KernelResult<()> {
    if !is_initialized() {
        return Err(KernelError::Uninitialized);
    }
    if !ao.priority().is_assignable() {
        return Err(KernelError::InvalidPriority);
    }
    let slot = ao.id() as usize;
    debug_assert!(slot < MAX_ACTIVE_OBJECTS, "active object id out of range");
    critical_section::with(|cs| {
        let mut k = KERNEL.borrow_ref_mut(cs);
        debug_assert!(k.registry[slot].is_none(), "active object id already registered");
        k.registry[slot] = Some(ao);
    });
    Ok(())
}

/// Links `id`'s active object into the ready list, in priority order with
/// ties broken by arrival order. A no-op if it's already running or
/// already queued. Corresponds to `SchedulerAddReady`; called by
/// [`crate::Active::post`] after a successful enqueue, always from inside
/// the same critical section as the put.
pub(crate) fn add_ready(id: u8) {
    critical_section::with(|cs| {
        let mut k = KERNEL.borrow_ref_mut(cs);
        let slot = id as usize;
        let Some(ao) = k.registry[slot] else {
            debug_assert!(false, "SchedulerAddReady on an unregistered id");
            return;
        };

        if ao.state() == AoState::Active {
            return;
        }
        if let Some(pos) = k.ready.iter().position(|&existing| existing == id) {
            k.ready.remove(pos);
        }

        let prio = ao.priority();
        // Insert after every already-ready id of equal-or-higher priority
        // (i.e. `<=`, not `<`) so two active objects that arrive at the same
        // priority are drained in arrival order instead of the later one
        // jumping ahead of the earlier.
        let insert_at = k.ready.partition_point(|&existing| {
            k.registry[existing as usize].map(|ao| ao.priority()).unwrap_or(Priority::NONE) <= prio
        });
        k.ready.insert(insert_at, id).expect("ready list capacity exceeded");
        ao.set_state(AoState::Ready);
    });
}

/// True if the head of the ready list outranks whatever is currently
/// active — i.e. a platform port should raise `PendSV` to get back here.
/// Corresponds to `Schedule`.
///
/// The reference kernel dereferences the ready-list head unconditionally;
/// when nothing is ready that's a null dereference. This checks first.
pub fn schedule() -> bool {
    critical_section::with(|cs| {
        let k = KERNEL.borrow_ref(cs);
        match k.ready.first() {
            Some(&id) => match k.registry[id as usize] {
                Some(ao) => ao.priority() < k.current,
                None => false,
            },
            None => false,
        }
    })
}

/// Drains the ready list: activates each active object in priority order,
/// runs its handler to completion for every message currently queued, then
/// moves on. Corresponds to `SchedulerActivateAO`.
///
/// The reference kernel advances `activated_ao = activated_ao->next` and
/// only afterwards checks whether the result is null — by which point it
/// has already dereferenced it to clear `->prev`. Looping on
/// `ready.first()` instead means there's no pointer to advance into in the
/// first place.
pub fn scheduler_activate_ao() {
    loop {
        let ao = critical_section::with(|cs| {
            let mut k = KERNEL.borrow_ref_mut(cs);
            let id = k.ready.first().copied()?;
            k.ready.remove(0);
            let ao = k.registry[id as usize]?;
            k.current = ao.priority();
            k.os.set_current_prio(ao.priority());
            Some(ao)
        });
        let Some(ao) = ao else { break };

        ao.set_state(AoState::Active);
        aomk_core::trace::emit(aomk_core::TraceEvent::AoActivated(ao.priority()));
        while !ao.queue_is_empty() {
            ao.dispatch_one();
        }
        ao.set_state(AoState::Waiting);
        aomk_core::trace::emit(aomk_core::TraceEvent::AoDeactivated(ao.priority()));
    }

    critical_section::with(|cs| {
        let mut k = KERNEL.borrow_ref_mut(cs);
        k.current = Priority::NONE;
        k.os.set_current_prio(Priority::NONE);
    });
}

/// Drives the scheduler forever: activate whatever's ready, then idle.
/// Corresponds to `SchedulerRun`. On real hardware the ready list is
/// drained from the `PendSV` handler instead and this loop only ever calls
/// `on_idle`; without an interrupt controller to tail-chain through, the
/// host-testable port polls `scheduler_activate_ao` directly.
pub fn scheduler_run() -> ! {
    loop {
        scheduler_activate_ao();
        let on_idle = critical_section::with(|cs| KERNEL.borrow_ref(cs).os.hooks().on_idle);
        if let Some(on_idle) = on_idle {
            on_idle();
        }
    }
}

/// Advances the 1 ms tick counter and runs `on_tick`. Called by
/// `aomk-timer`'s `SysTick`-driven entry point after it has processed timed
/// events, matching the reference kernel's `SysTick_Handler` ordering.
pub fn on_sys_tick() {
    let on_tick = critical_section::with(|cs| {
        let mut k = KERNEL.borrow_ref_mut(cs);
        k.os.advance_time();
        k.os.hooks().on_tick
    });
    if let Some(on_tick) = on_tick {
        on_tick();
    }
}

/// The current value of the 1 ms tick counter. Corresponds to `OSGetTime`.
pub fn current_time() -> Tick {
    critical_section::with(|cs| KERNEL.borrow_ref(cs).os.time())
}

/// The priority of whichever active object is currently draining its
/// queue, or [`Priority::NONE`] if the kernel is idle.
pub fn current_priority() -> Priority {
    critical_section::with(|cs| KERNEL.borrow_ref(cs).current)
}

#[cfg(test)]
pub(crate) fn reset_for_test() {
    critical_section::with(|cs| {
        *KERNEL.borrow_ref_mut(cs) = KernelState::new();
    });
}
