//! Cross-module scheduling behavior exercised through the crate's public
//! API only, mirroring the run-to-completion-then-priority-order scenario
//! the kernel is specified against.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use aomk_core::{Hooks, Message, Priority};
use aomk_qf::{active_object_create, current_priority, kernel_init, scheduler_activate_ao, Active};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Order(u32);

impl Message for Order {
    fn id(&self) -> u32 {
        self.0
    }
}

static SEEN: Mutex<Vec<u32>> = Mutex::new(Vec::new());

fn record(_name: &str, msg: Order) {
    SEEN.lock().unwrap().push(msg.0);
}

fn handle_high(msg: Order) {
    record("high", msg);
}

fn handle_low(msg: Order) {
    record("low", msg);
}

fn handle_sibling_a(msg: Order) {
    record("sibling-a", msg);
}

fn handle_sibling_b(msg: Order) {
    record("sibling-b", msg);
}

static HIGH: Active<Order, 4> = Active::new(0, Priority::new(2), handle_high);
static LOW: Active<Order, 4> = Active::new(1, Priority::new(20), handle_low);

// Two distinct active objects sharing one priority — the scenario the
// single-AO registry used to make structurally impossible.
static SIBLING_A: Active<Order, 4> = Active::new(2, Priority::new(8), handle_sibling_a);
static SIBLING_B: Active<Order, 4> = Active::new(3, Priority::new(8), handle_sibling_b);

static GUARD: Mutex<()> = Mutex::new(());
static REGISTERED: std::sync::Once = std::sync::Once::new();

fn reset() -> std::sync::MutexGuard<'static, ()> {
    let guard = GUARD.lock().unwrap_or_else(|p| p.into_inner());
    REGISTERED.call_once(|| {
        kernel_init(Hooks::default());
        active_object_create(&HIGH).unwrap();
        active_object_create(&LOW).unwrap();
        active_object_create(&SIBLING_A).unwrap();
        active_object_create(&SIBLING_B).unwrap();
    });
    SEEN.lock().unwrap().clear();
    guard
}

#[test]
fn a_higher_priority_ao_activates_before_a_lower_one_regardless_of_post_order() {
    let _guard = reset();
    LOW.post(Order(1)).unwrap();
    HIGH.post(Order(2)).unwrap();

    scheduler_activate_ao();

    assert_eq!(*SEEN.lock().unwrap(), vec![2, 1]);
    assert_eq!(current_priority(), Priority::NONE);
}

#[test]
fn two_active_objects_at_equal_priority_activate_in_arrival_order() {
    let _guard = reset();
    SIBLING_A.post(Order(1)).unwrap();
    SIBLING_B.post(Order(2)).unwrap();

    scheduler_activate_ao();

    assert_eq!(*SEEN.lock().unwrap(), vec![1, 2]);
}

#[test]
fn reversing_arrival_order_reverses_activation_order_at_equal_priority() {
    let _guard = reset();
    SIBLING_B.post(Order(3)).unwrap();
    SIBLING_A.post(Order(4)).unwrap();

    scheduler_activate_ao();

    assert_eq!(*SEEN.lock().unwrap(), vec![3, 4]);
}

#[test]
fn fifo_within_one_queue_holds() {
    let _guard = reset();
    LOW.post(Order(10)).unwrap();
    LOW.post(Order(11)).unwrap();
    LOW.post(Order(12)).unwrap();

    scheduler_activate_ao();

    assert_eq!(*SEEN.lock().unwrap(), vec![10, 11, 12]);
}
