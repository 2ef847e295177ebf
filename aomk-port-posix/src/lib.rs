//! POSIX host port: runs the kernel on a development machine with no real
//! interrupt controller to bridge ISR exit into the activator.
//!
//! There's no PendSV to raise and no BASEPRI to elevate on a POSIX thread,
//! so [`PosixPort`]'s three methods are no-ops; the bridge is instead a
//! background thread that ticks once a millisecond and, right after running
//! the ISR-exit sequence, polls the activator directly — the same "no
//! interrupt controller to tail-chain through" shape `aomk-qf`'s own
//! `scheduler_run` idle loop uses.

use std::thread;
use std::time::Duration;

use aomk_port::Port;

/// A `Port` with nothing to do: POSIX has no PendSV bit, no BASEPRI
/// register, and no store-buffer erratum to work around.
pub struct PosixPort;

impl Port for PosixPort {
    fn raise_pendsv(&self) {}
    fn set_basepri(&self, _level: u8) {}
    fn data_sync_barrier(&self) {}
}

/// Spawns the 1 ms tick thread: timed events, the tick counter and
/// `on_tick` hook, the ISR-exit sequence, then drains the ready list.
/// Corresponds to the reference `SysTick_Handler` immediately tail-chaining
/// into `PendSV` — collapsed onto one step since this host thread has no
/// hardware exception boundary to defer across.
pub fn spawn_ticker(period: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || loop {
        thread::sleep(period);
        aomk_timer::process_timed_events();
        aomk_qf::on_sys_tick();
        aomk_port::isr_exit(&PosixPort);
        aomk_qf::scheduler_activate_ao();
    })
}

/// Starts the 1 ms ticker and runs the scheduler's idle loop on the calling
/// thread. Corresponds to `SchedulerRun` plus the application wiring that
/// starts the tick source before entering it.
pub fn run() -> ! {
    spawn_ticker(Duration::from_millis(1));
    aomk_qf::scheduler_run()
}
