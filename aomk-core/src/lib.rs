#![no_std]
#![forbid(unsafe_code)]

//! # aomk-core
//!
//! Shared, dependency-free types for the active-object micro-kernel: AO
//! priorities, the message header every posted message carries, the tick
//! counter driving the timed-event engine, the crate-wide error enum, and
//! the [`trace`] module the rest of the workspace emits state transitions
//! through.
//!
//! Nothing in this crate owns a ready list, a queue, or a pool — those live
//! in `aomk-qf`, `aomk-queue`, and `aomk-mem` respectively. This crate only
//! defines the vocabulary they share.

#[cfg(feature = "std")]
extern crate std;

mod error;
mod message;
mod os;
mod priority;
mod time;
pub mod trace;

pub use error::{KernelError, KernelResult};
pub use message::{Message, MessageHeader, PoolKeyMessage, TimestampedMessage, MESSAGE_MAX_SIZE};
pub use os::{Hooks, Os};
pub use priority::Priority;
pub use time::Tick;
pub use trace::TraceEvent;

/// `BASEPRI` level the activator runs at while draining an active object's
/// queue; only interrupts of strictly higher priority (SysTick, in this
/// design) may preempt it. Mirrors `OS_BASEPRI` in the reference kernel.
pub const OS_BASEPRI: u8 = 0x3F;
