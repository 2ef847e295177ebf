use core::fmt;

/// Result alias used throughout the kernel crates.
pub type KernelResult<T> = Result<T, KernelError>;

/// Recoverable, resource-exhaustion-class errors (spec §7 category 1).
/// Programmer errors (null handler, get-from-empty, oversized message) are
/// `debug_assert!`s at the call site, not variants here — they are
/// design-time invariant violations with no runtime recovery path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// A message queue had no free slot for `MsgQueuePut`.
    QueueFull,
    /// The fixed-block pool had no free run of the requested size.
    PoolExhausted,
    /// A pool allocation size was not one of 32/64/128/256.
    InvalidSize,
    /// `Priority::NONE` (or another reserved value) used where an
    /// assignable active-object priority was required.
    InvalidPriority,
    /// An operation was attempted before `KernelInit` ran.
    Uninitialized,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::QueueFull => write!(f, "message queue is full"),
            KernelError::PoolExhausted => write!(f, "memory pool has no free block of that size"),
            KernelError::InvalidSize => write!(f, "pool allocation size must be 32, 64, 128, or 256"),
            KernelError::InvalidPriority => write!(f, "priority is not assignable to an active object"),
            KernelError::Uninitialized => write!(f, "kernel has not been initialized"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for KernelError {}

#[cfg(feature = "defmt")]
impl defmt::Format for KernelError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            KernelError::QueueFull => defmt::write!(fmt, "QueueFull"),
            KernelError::PoolExhausted => defmt::write!(fmt, "PoolExhausted"),
            KernelError::InvalidSize => defmt::write!(fmt, "InvalidSize"),
            KernelError::InvalidPriority => defmt::write!(fmt, "InvalidPriority"),
            KernelError::Uninitialized => defmt::write!(fmt, "Uninitialized"),
        }
    }
}
