#![no_std]
#![forbid(unsafe_code)]

//! Active-object runtime: the registry, the priority-sorted ready list, and
//! the run-to-completion scheduler that ties a [`MessageQueue`]-backed
//! [`Active`] object to the rest of the kernel.
//!
//! [`MessageQueue`]: aomk_queue::MessageQueue

mod active;
mod scheduler;

pub use active::{Active, ActiveObject, AoState};
pub use scheduler::{
    active_object_create, current_priority, current_time, kernel_init, on_sys_tick, schedule,
    scheduler_activate_ao, scheduler_run, MAX_ACTIVE_OBJECTS,
};

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;
    use aomk_core::{Hooks, KernelError, Priority};
    use core::sync::atomic::{AtomicU32, Ordering};

    static PINGS: AtomicU32 = AtomicU32::new(0);
    static LAST_ID: AtomicU32 = AtomicU32::new(0);

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Ping(u32);

    impl aomk_core::Message for Ping {
        fn id(&self) -> u32 {
            self.0
        }
    }

    fn handle_ping(msg: Ping) {
        PINGS.fetch_add(1, Ordering::SeqCst);
        LAST_ID.store(msg.0, Ordering::SeqCst);
    }

    static HIGH: Active<Ping, 4> = Active::new(0, Priority::new(1), handle_ping);
    static LOW: Active<Ping, 4> = Active::new(1, Priority::new(5), handle_ping);

    // Every test shares the one process-wide kernel singleton and the
    // HIGH/LOW statics, so tests must not run concurrently with each other.
    static TEST_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn reset() -> std::sync::MutexGuard<'static, ()> {
        let guard = TEST_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        scheduler::reset_for_test();
        PINGS.store(0, Ordering::SeqCst);
        LAST_ID.store(0, Ordering::SeqCst);
        kernel_init(Hooks::default());
        active_object_create(&HIGH).unwrap();
        active_object_create(&LOW).unwrap();
        guard
    }

    #[test]
    fn posting_readies_and_activation_drains_the_queue() {
        let _guard = reset();
        HIGH.post(Ping(7)).unwrap();
        assert_eq!(HIGH.state(), AoState::Ready);

        scheduler_activate_ao();

        assert_eq!(PINGS.load(Ordering::SeqCst), 1);
        assert_eq!(LAST_ID.load(Ordering::SeqCst), 7);
        assert_eq!(HIGH.state(), AoState::Waiting);
        assert_eq!(current_priority(), Priority::NONE);
    }

    #[test]
    fn higher_priority_ao_activates_before_a_lower_one() {
        let _guard = reset();
        LOW.post(Ping(1)).unwrap();
        HIGH.post(Ping(2)).unwrap();

        // Both are ready; activation should visit HIGH (priority 1) first.
        scheduler_activate_ao();

        assert!(HIGH.is_empty());
        assert!(LOW.is_empty());
        assert_eq!(PINGS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn schedule_reports_true_only_when_ready_outranks_current() {
        let _guard = reset();
        assert!(!schedule());

        LOW.post(Ping(1)).unwrap();
        assert!(schedule());
    }

    #[test]
    fn kernel_init_runs_on_init_hook_exactly_once() {
        let _guard = reset();
        static CALLS: AtomicU32 = AtomicU32::new(0);
        fn bump() {
            CALLS.fetch_add(1, Ordering::SeqCst);
        }
        kernel_init(Hooks { on_init: Some(bump), on_idle: None, on_tick: None });
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn calls_made_before_kernel_init_fail_with_uninitialized() {
        let _guard = TEST_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        scheduler::reset_for_test();

        assert_eq!(active_object_create(&HIGH), Err(KernelError::Uninitialized));
        assert_eq!(HIGH.post(Ping(1)), Err(KernelError::Uninitialized));

        kernel_init(Hooks::default());
        active_object_create(&HIGH).unwrap();
        assert!(HIGH.post(Ping(1)).is_ok());
    }

    #[test]
    fn on_sys_tick_advances_time_and_runs_the_tick_hook() {
        let _guard = reset();
        static TICKS: AtomicU32 = AtomicU32::new(0);
        fn bump() {
            TICKS.fetch_add(1, Ordering::SeqCst);
        }
        kernel_init(Hooks { on_init: None, on_idle: None, on_tick: Some(bump) });
        let before = current_time().raw();
        on_sys_tick();
        assert_eq!(current_time().raw(), before + 1);
        assert_eq!(TICKS.load(Ordering::SeqCst), 1);
    }
}
