#![no_std]
#![forbid(unsafe_code)]

//! The narrow slice of hardware the kernel needs a concrete target to
//! supply: a way to request a deferred activation, a way to mask
//! interrupts below tick priority while the activator runs, and a memory
//! barrier for one specific Cortex-M store-buffer erratum. Everything else
//! — enqueue/dequeue, the ready list, the tick counter — goes through
//! [`critical_section::with`], which already has a backend per target;
//! this crate only covers what that abstraction doesn't.
//!
//! A concrete `Port` lives in its own port crate (e.g. the inline PendSV
//! trigger on Cortex-M needs `unsafe`, which this `#![forbid(unsafe_code)]`
//! crate can't contain); [`isr_exit`] and [`pendsv_handler`] are the glue
//! every port wires into its interrupt vector table the same way.

/// BASEPRI value the activator runs under: low enough to keep servicing
/// `SysTick` and other tick-class interrupts, high enough to block
/// anything that could re-enter the scheduler. Corresponds to `OS_BASEPRI`.
pub const OS_BASEPRI: u8 = 0x3F;

/// The three platform primitives the kernel needs beyond what
/// `critical_section` already provides.
pub trait Port: Sync {
    /// Requests that the CPU tail-chain into the activator once the
    /// current ISR returns. Corresponds to writing the PendSV-set bit in
    /// `ICSR`.
    fn raise_pendsv(&self);

    /// Sets the priority mask so only interrupts strictly above `level` can
    /// preempt. Called with [`OS_BASEPRI`] on activator entry and `0` on
    /// exit.
    fn set_basepri(&self, level: u8);

    /// Memory barrier issued after re-enabling interrupts at ISR exit, to
    /// work around the Cortex-M "store immediate at end of ISR" erratum. A
    /// no-op on targets that don't need it.
    fn data_sync_barrier(&self);
}

/// Runs at the end of every application ISR, after the ISR's own work is
/// done. Corresponds to `ISR_EXIT`: asks the scheduler whether a
/// higher-priority active object is now ready and, if so, requests the
/// deferred activation; the barrier runs unconditionally either way.
///
/// [`aomk_qf::schedule`] already disables interrupts for the duration of
/// its own read, so there's no separate critical section to open here —
/// unlike the reference `OS_ISR_EXIT` macro, which brackets its `Schedule()`
/// call in an explicit disable/enable pair.
pub fn isr_exit<P: Port>(port: &P) {
    if aomk_qf::schedule() {
        port.raise_pendsv();
    }
    port.data_sync_barrier();
}

/// Runs the activator at an elevated priority mask so only tick-class
/// interrupts can preempt it, then restores the mask. Corresponds to the
/// `PendSV` handler's BASEPRI elevation around `SchedulerActivateAO`; the
/// exception-frame fabrication that lets the real handler return to thread
/// mode is the concrete port's job, not this crate's.
pub fn pendsv_handler<P: Port>(port: &P) {
    port.set_basepri(OS_BASEPRI);
    aomk_qf::scheduler_activate_ao();
    port.set_basepri(0);
}

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

    use aomk_core::{Hooks, Priority};
    use aomk_qf::{active_object_create, kernel_init, Active};

    #[derive(Default)]
    struct RecordingPort {
        pendsv_raised: AtomicBool,
        basepri: AtomicU8,
        barriers: AtomicU8,
    }

    impl Port for RecordingPort {
        fn raise_pendsv(&self) {
            self.pendsv_raised.store(true, Ordering::SeqCst);
        }
        fn set_basepri(&self, level: u8) {
            self.basepri.store(level, Ordering::SeqCst);
        }
        fn data_sync_barrier(&self) {
            self.barriers.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct Tick(u32);
    impl aomk_core::Message for Tick {
        fn id(&self) -> u32 {
            self.0
        }
    }

    static HANDLED: AtomicBool = AtomicBool::new(false);
    fn handle(_msg: Tick) {
        HANDLED.store(true, Ordering::SeqCst);
    }
    static AO: Active<Tick, 4> = Active::new(0, Priority::new(4), handle);

    static TEST_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn reset() -> std::sync::MutexGuard<'static, ()> {
        let guard = TEST_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            kernel_init(Hooks::default());
            active_object_create(&AO).unwrap();
        });
        HANDLED.store(false, Ordering::SeqCst);
        guard
    }

    #[test]
    fn isr_exit_always_runs_the_barrier_but_only_raises_pendsv_when_something_is_ready() {
        let _guard = reset();
        let port = RecordingPort::default();

        isr_exit(&port);
        assert!(!port.pendsv_raised.load(Ordering::SeqCst));
        assert_eq!(port.barriers.load(Ordering::SeqCst), 1);

        AO.post(Tick(1)).unwrap();
        isr_exit(&port);
        assert!(port.pendsv_raised.load(Ordering::SeqCst));
        assert_eq!(port.barriers.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn pendsv_handler_elevates_basepri_during_activation_and_restores_it() {
        let _guard = reset();
        let port = RecordingPort::default();
        AO.post(Tick(7)).unwrap();

        pendsv_handler(&port);

        assert!(HANDLED.load(Ordering::SeqCst));
        assert_eq!(port.basepri.load(Ordering::SeqCst), 0);
    }
}
