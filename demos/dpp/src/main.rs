//! Dining philosophers, built entirely on the active-object stack: one
//! [`Active`] per philosopher walking its own [`StateMachine`] through a
//! shared three-command chain, a table active object arbitrating forks, a
//! periodic [`TimedEvent`] pacing each philosopher's thinking and eating,
//! and the memory pool standing in for a per-meal payload a real
//! application would size messages around.
//!
//! Runs forever on the POSIX port; stop it with ctrl-c.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Vec as BoundedVec;

use aomk_core::{Hooks, Message, Priority};
use aomk_mem::{BlockSize, MemoryPool, PoolKey};
use aomk_qf::{active_object_create, kernel_init, Active};
use aomk_seq::{Command, EndBehavior, StateMachine};
use aomk_timer::{TimedEvent, TimedEventKind};

const N_PHILO: usize = 5;
const TICK_PERIOD: u32 = 150;
const NAMES: [&str; N_PHILO] = ["Aristotle", "Kant", "Spinoza", "Marx", "Russell"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhiloEvent {
    Tick,
    Granted,
}

impl Message for PhiloEvent {
    fn id(&self) -> u32 {
        match self {
            PhiloEvent::Tick => 0,
            PhiloEvent::Granted => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableEvent {
    Hungry(usize),
    Done(usize),
}

impl Message for TableEvent {
    fn id(&self) -> u32 {
        match self {
            TableEvent::Hungry(_) => 0,
            TableEvent::Done(_) => 1,
        }
    }
}

/// Small, seedable PRNG for think/eat durations. `rand`'s generators aren't
/// const-constructible, and every philosopher's runtime state — including
/// its generator — has to live in a `static`'s const initializer.
struct Xorshift32(u32);

impl Xorshift32 {
    const fn new(seed: u32) -> Self {
        Xorshift32(if seed == 0 { 0xA5A5_A5A5 } else { seed })
    }

    fn next_in(&mut self, lo: u32, hi: u32) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        lo + x % (hi - lo + 1)
    }
}

static POOL: MemoryPool = MemoryPool::new();

/// Per-philosopher instance data threaded through every command callback.
/// `pending_table_msg` is how a command hands a message to the table
/// active object back out to [`dispatch`] without posting from inside the
/// critical section guarding this data — mirroring how `SchedulerAddReady`
/// runs after, not inside, `Active::post`'s own queue-mutation section.
struct PhiloData {
    id: usize,
    rng: Xorshift32,
    remaining_ticks: u32,
    meal: Option<PoolKey>,
    meals_eaten: u32,
    pending_table_msg: Option<TableEvent>,
}

impl PhiloData {
    const fn new(id: usize) -> Self {
        PhiloData {
            id,
            rng: Xorshift32::new((id as u32 + 1).wrapping_mul(2_654_435_761)),
            remaining_ticks: 0,
            meal: None,
            meals_eaten: 0,
            pending_table_msg: None,
        }
    }
}

struct Think;
impl Command<PhiloData, PhiloEvent> for Think {
    fn on_start(&self, data: &mut PhiloData) {
        data.remaining_ticks = data.rng.next_in(2, 5);
        println!("{} is thinking", NAMES[data.id]);
    }

    fn on_message(&self, msg: &PhiloEvent, data: &mut PhiloData) -> bool {
        let PhiloEvent::Tick = msg else { return false };
        data.remaining_ticks -= 1;
        data.remaining_ticks == 0
    }

    fn on_end(&self, _data: &mut PhiloData) {}

    fn end_behavior(&self) -> EndBehavior {
        EndBehavior::WaitForEnd
    }
}

struct RequestFork;
impl Command<PhiloData, PhiloEvent> for RequestFork {
    fn on_start(&self, data: &mut PhiloData) {
        println!("{} is hungry", NAMES[data.id]);
        data.pending_table_msg = Some(TableEvent::Hungry(data.id));
    }

    fn on_message(&self, msg: &PhiloEvent, _data: &mut PhiloData) -> bool {
        matches!(msg, PhiloEvent::Granted)
    }

    fn on_end(&self, data: &mut PhiloData) {
        println!("{} picked up both forks", NAMES[data.id]);
    }

    fn end_behavior(&self) -> EndBehavior {
        EndBehavior::WaitForEnd
    }
}

struct Eat;
impl Command<PhiloData, PhiloEvent> for Eat {
    fn on_start(&self, data: &mut PhiloData) {
        data.remaining_ticks = data.rng.next_in(2, 4);
        data.meal = POOL.allocate(BlockSize::B32).ok();
        println!("{} is eating", NAMES[data.id]);
    }

    fn on_message(&self, msg: &PhiloEvent, data: &mut PhiloData) -> bool {
        let PhiloEvent::Tick = msg else { return false };
        data.remaining_ticks -= 1;
        data.remaining_ticks == 0
    }

    fn on_end(&self, data: &mut PhiloData) {
        if let Some(key) = data.meal.take() {
            POOL.free(key);
        }
        data.meals_eaten += 1;
        println!("{} finished eating (meal #{})", NAMES[data.id], data.meals_eaten);
        data.pending_table_msg = Some(TableEvent::Done(data.id));
    }

    fn end_behavior(&self) -> EndBehavior {
        EndBehavior::WaitForEnd
    }
}

static THINK: Think = Think;
static REQUEST_FORK: RequestFork = RequestFork;
static EAT: Eat = Eat;
static CHAIN: [&'static dyn Command<PhiloData, PhiloEvent>; 3] = [&THINK, &REQUEST_FORK, &EAT];

struct PhiloRuntime {
    sm: StateMachine<PhiloData, PhiloEvent>,
    data: PhiloData,
}

impl PhiloRuntime {
    const fn new(id: usize) -> Self {
        PhiloRuntime { sm: StateMachine::new(&CHAIN), data: PhiloData::new(id) }
    }
}

static PHILO_RUNTIME: [Mutex<RefCell<PhiloRuntime>>; N_PHILO] = [
    Mutex::new(RefCell::new(PhiloRuntime::new(0))),
    Mutex::new(RefCell::new(PhiloRuntime::new(1))),
    Mutex::new(RefCell::new(PhiloRuntime::new(2))),
    Mutex::new(RefCell::new(PhiloRuntime::new(3))),
    Mutex::new(RefCell::new(PhiloRuntime::new(4))),
];

/// Steps philosopher `id`'s state machine on `msg`, restarting the chain
/// whenever it runs off the end, then posts whatever table message the
/// command that just ran queued up — done outside the critical section
/// above so this never nests one `critical_section::with` inside another.
fn dispatch(id: usize, msg: PhiloEvent) {
    let pending = critical_section::with(|cs| {
        let mut runtime = PHILO_RUNTIME[id].borrow_ref_mut(cs);
        let PhiloRuntime { sm, data } = &mut *runtime;
        data.pending_table_msg = None;
        if sm.step(&msg, data) {
            sm.start(data);
        }
        data.pending_table_msg.take()
    });

    if let Some(table_msg) = pending {
        TABLE.post(table_msg).expect("table queue full");
    }
}

fn philo_0(msg: PhiloEvent) {
    dispatch(0, msg);
}
fn philo_1(msg: PhiloEvent) {
    dispatch(1, msg);
}
fn philo_2(msg: PhiloEvent) {
    dispatch(2, msg);
}
fn philo_3(msg: PhiloEvent) {
    dispatch(3, msg);
}
fn philo_4(msg: PhiloEvent) {
    dispatch(4, msg);
}

static PHILO_0: Active<PhiloEvent, 4> = Active::new(0, Priority::new(10), philo_0);
static PHILO_1: Active<PhiloEvent, 4> = Active::new(1, Priority::new(11), philo_1);
static PHILO_2: Active<PhiloEvent, 4> = Active::new(2, Priority::new(12), philo_2);
static PHILO_3: Active<PhiloEvent, 4> = Active::new(3, Priority::new(13), philo_3);
static PHILO_4: Active<PhiloEvent, 4> = Active::new(4, Priority::new(14), philo_4);

static PHILO_AOS: [&'static Active<PhiloEvent, 4>; N_PHILO] =
    [&PHILO_0, &PHILO_1, &PHILO_2, &PHILO_3, &PHILO_4];

static TICK_0: TimedEvent<PhiloEvent, 4> =
    TimedEvent::new(&PHILO_0, PhiloEvent::Tick, TICK_PERIOD, TimedEventKind::Periodic);
static TICK_1: TimedEvent<PhiloEvent, 4> =
    TimedEvent::new(&PHILO_1, PhiloEvent::Tick, TICK_PERIOD, TimedEventKind::Periodic);
static TICK_2: TimedEvent<PhiloEvent, 4> =
    TimedEvent::new(&PHILO_2, PhiloEvent::Tick, TICK_PERIOD, TimedEventKind::Periodic);
static TICK_3: TimedEvent<PhiloEvent, 4> =
    TimedEvent::new(&PHILO_3, PhiloEvent::Tick, TICK_PERIOD, TimedEventKind::Periodic);
static TICK_4: TimedEvent<PhiloEvent, 4> =
    TimedEvent::new(&PHILO_4, PhiloEvent::Tick, TICK_PERIOD, TimedEventKind::Periodic);

static TICKS: [&'static TimedEvent<PhiloEvent, 4>; N_PHILO] =
    [&TICK_0, &TICK_1, &TICK_2, &TICK_3, &TICK_4];

fn left_fork(id: usize) -> usize {
    id
}

fn right_fork(id: usize) -> usize {
    (id + 1) % N_PHILO
}

fn fork_mask(id: usize) -> u8 {
    (1 << left_fork(id)) | (1 << right_fork(id))
}

struct TableState {
    forks_free: u8,
    pending: BoundedVec<usize, N_PHILO>,
}

impl TableState {
    const fn new() -> Self {
        TableState { forks_free: (1 << N_PHILO) - 1, pending: BoundedVec::new() }
    }
}

static TABLE_STATE: Mutex<RefCell<TableState>> = Mutex::new(RefCell::new(TableState::new()));

/// Grants both of a philosopher's forks at once or not at all, so no
/// philosopher ever holds one fork while waiting on the other — the
/// resource-hierarchy rule that makes this table deadlock-free without
/// needing an odd-one-out fork-pickup order.
fn table_handle(msg: TableEvent) {
    let granted: BoundedVec<usize, N_PHILO> = critical_section::with(|cs| {
        let mut state = TABLE_STATE.borrow_ref_mut(cs);
        let mut granted = BoundedVec::new();
        match msg {
            TableEvent::Hungry(id) => {
                let mask = fork_mask(id);
                if state.forks_free & mask == mask {
                    state.forks_free &= !mask;
                    let _ = granted.push(id);
                } else {
                    let _ = state.pending.push(id);
                }
            }
            TableEvent::Done(id) => {
                state.forks_free |= fork_mask(id);
                let mut i = 0;
                while i < state.pending.len() {
                    let candidate = state.pending[i];
                    let mask = fork_mask(candidate);
                    if state.forks_free & mask == mask {
                        state.forks_free &= !mask;
                        let _ = granted.push(candidate);
                        state.pending.remove(i);
                    } else {
                        i += 1;
                    }
                }
            }
        }
        granted
    });

    for id in granted {
        PHILO_AOS[id].post(PhiloEvent::Granted).expect("philosopher queue full");
    }
}

static TABLE: Active<TableEvent, 8> = Active::new(5, Priority::new(5), table_handle);

fn main() {
    kernel_init(Hooks::default());
    active_object_create(&TABLE).expect("failed to register the table active object");
    for &ao in PHILO_AOS.iter() {
        active_object_create(ao).expect("failed to register a philosopher active object");
    }

    critical_section::with(|cs| {
        for runtime in PHILO_RUNTIME.iter() {
            let mut runtime = runtime.borrow_ref_mut(cs);
            let PhiloRuntime { sm, data } = &mut *runtime;
            sm.start(data);
        }
    });

    for tick in TICKS.iter() {
        tick.arm();
    }

    println!("dining philosophers running on {} ms ticks, ctrl-c to exit", TICK_PERIOD);
    aomk_port_posix::run();
}
