use crate::{Priority, Tick};

/// Application-supplied callbacks. All three are optional; a `None` hook is
/// simply skipped. Corresponds to `OSCallbacksCfg_t` in the reference
/// kernel.
#[derive(Default, Clone, Copy)]
pub struct Hooks {
    /// Called once, at the end of `KernelInit`.
    pub on_init: Option<fn()>,
    /// Called repeatedly from `SchedulerRun`'s idle loop whenever the ready
    /// list is empty.
    pub on_idle: Option<fn()>,
    /// Called once per `SysTick`, after timed events have been processed.
    pub on_tick: Option<fn()>,
}

/// The process-wide kernel singleton's data: the tick counter, the
/// priority of whichever active object is currently draining its queue,
/// ISR nesting depth, and the application hooks. `aomk-qf` owns the single
/// instance of this type and is the only crate that mutates it; everyone
/// else reads through `aomk_qf::kernel()`.
pub struct Os {
    time: Tick,
    current_prio: Priority,
    nesting: u8,
    hooks: Hooks,
}

impl Os {
    /// Construct a freshly-initialized `Os`: zero tick, no active object
    /// running (`Priority::NONE`), zero ISR nesting.
    pub const fn new(hooks: Hooks) -> Self {
        Os {
            time: Tick::ZERO,
            current_prio: Priority::NONE,
            nesting: 0,
            hooks,
        }
    }

    pub fn time(&self) -> Tick {
        self.time
    }

    pub fn advance_time(&mut self) {
        self.time.advance();
    }

    pub fn current_prio(&self) -> Priority {
        self.current_prio
    }

    pub fn set_current_prio(&mut self, prio: Priority) {
        self.current_prio = prio;
    }

    pub fn nesting(&self) -> u8 {
        self.nesting
    }

    pub fn enter_isr(&mut self) {
        self.nesting += 1;
    }

    pub fn exit_isr(&mut self) {
        self.nesting = self.nesting.saturating_sub(1);
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Replaces the application hooks. Called once, by `KernelInit`.
    pub fn set_hooks(&mut self, hooks: Hooks) {
        self.hooks = hooks;
    }
}
