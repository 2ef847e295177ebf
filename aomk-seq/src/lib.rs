#![no_std]
#![forbid(unsafe_code)]

//! A linear command-chain state machine: `Start` walks through any
//! instantly-completing commands at the front of the chain, and `Step`
//! feeds messages to whichever command is currently waiting, advancing
//! (and re-`Start`ing) once it signals it's done.
//!
//! Corresponds to `StateMachine_t`/`Command_t` in the reference kernel.
//! There, `current` is a pointer threaded through each command's own
//! `next` field; here the chain is a plain `&'static` slice and `current`
//! is an index into it, so there's no pointer-chasing command chain to
//! get wrong. The mutual Start/Start recursion for INSTANT commands
//! becomes the bounded loop in [`StateMachine::advance_from`].

/// Whether a command finishes the instant `on_start` runs, or waits for
/// `on_message` to report completion. Corresponds to
/// `COMMAND_ON_END_INSTANT` / `COMMAND_ON_END_WAIT_FOR_END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBehavior {
    /// Completes as soon as `on_start` returns; never observed as `current`
    /// between messages.
    Instant,
    /// Stays `current` until `on_message` returns `true`.
    WaitForEnd,
}

#[cfg(feature = "defmt")]
impl defmt::Format for EndBehavior {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            EndBehavior::Instant => defmt::write!(fmt, "Instant"),
            EndBehavior::WaitForEnd => defmt::write!(fmt, "WaitForEnd"),
        }
    }
}

/// A single step in a command chain. `D` is the application's shared
/// instance data, threaded through every callback by `&mut` reference;
/// `M` is the message type `Step` feeds to whichever command is current.
///
/// Corresponds to `Command_t`'s three function pointers plus
/// `end_behavior`; `next` is no longer part of the command itself, since
/// the chain's order now lives in the slice passed to [`StateMachine::new`].
pub trait Command<D, M>: Sync {
    /// Runs once when this command becomes current, either from
    /// [`StateMachine::start`] or after the previous command finished.
    fn on_start(&self, data: &mut D);

    /// Runs once per message while this command is current. Returning
    /// `true` means the command is done; the default never is, which is
    /// correct for an [`EndBehavior::Instant`] command since it never
    /// survives to see a message.
    fn on_message(&self, _msg: &M, _data: &mut D) -> bool {
        false
    }

    /// Runs once, right after this command is determined to be done —
    /// either because `on_message` returned `true`, or immediately after
    /// `on_start` for an [`EndBehavior::Instant`] command.
    fn on_end(&self, data: &mut D);

    fn end_behavior(&self) -> EndBehavior;
}

/// Drives a fixed chain of [`Command`]s from front to back.
pub struct StateMachine<D: 'static, M: 'static> {
    chain: &'static [&'static dyn Command<D, M>],
    current: Option<usize>,
}

impl<D: 'static, M: 'static> StateMachine<D, M> {
    /// Builds a machine over `chain`, not yet started. Corresponds to
    /// `StateMachineInit`.
    pub const fn new(chain: &'static [&'static dyn Command<D, M>]) -> Self {
        StateMachine { chain, current: None }
    }

    /// The index of the currently-waiting command, or `None` if the chain
    /// hasn't been started or has already run to completion.
    pub fn current(&self) -> Option<usize> {
        self.current
    }

    /// Starts the chain from its first command, running every
    /// [`EndBehavior::Instant`] command's `on_start`/`on_end` pair in turn
    /// until one is [`EndBehavior::WaitForEnd`] or the chain is empty.
    /// Corresponds to `StateMachineStart`.
    pub fn start(&mut self, data: &mut D) {
        self.advance_from(0, data);
    }

    /// Feeds `msg` to the current command. If it reports completion, runs
    /// its `on_end`, then starts whatever comes next. Returns `true` iff
    /// the chain has just run out of commands. Corresponds to
    /// `StateMachineStep`.
    pub fn step(&mut self, msg: &M, data: &mut D) -> bool {
        let Some(idx) = self.current else {
            return true;
        };
        let cmd = self.chain[idx];
        if !cmd.on_message(msg, data) {
            return false;
        }
        cmd.on_end(data);
        self.advance_from(idx + 1, data);
        self.current.is_none()
    }

    /// Walks forward from `idx`, starting each command in turn; an
    /// `Instant` command also gets its `on_end` called right away, so every
    /// command's lifecycle is the same `on_start` → `on_end` pair whether
    /// it finishes instantly or a message finishes it.
    fn advance_from(&mut self, mut idx: usize, data: &mut D) {
        loop {
            let Some(cmd) = self.chain.get(idx) else {
                self.current = None;
                return;
            };
            cmd.on_start(data);
            if cmd.end_behavior() == EndBehavior::Instant {
                cmd.on_end(data);
                idx += 1;
                continue;
            }
            self.current = Some(idx);
            return;
        }
    }
}
