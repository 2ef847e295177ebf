use core::fmt;

/// Width, in bytes, of the fixed slot a [`crate::Priority`]'s message queue
/// stores each message in. Mirrors `OS_MESSAGE_MAX_SIZE` from the reference
/// kernel; payloads that don't fit must be indirected through the memory
/// pool and referenced by [`PoolKeyMessage`]'s 16-bit key instead.
pub const MESSAGE_MAX_SIZE: usize = 20;

/// The fixed header every message carries: an identifying signal and the
/// size of the concrete type for tracing/debugging. The reference kernel
/// reads this header off the front of an untyped byte slot; here it is a
/// field every [`Message`] implementation exposes directly, since Rust's
/// generics let the queue stay typed end to end instead of reinterpreting
/// raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Application-defined message identifier.
    pub id: u32,
    /// Size of the concrete message in bytes, for tracing only.
    pub size: u8,
}

impl fmt::Display for MessageHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}({}B)", self.id, self.size)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MessageHeader {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "msg#{=u32}({=u8}B)", self.id, self.size);
    }
}

/// A value that can be posted into an active object's message queue.
///
/// Every message is `Copy`: `MsgQueuePut` never takes ownership away from
/// the caller, it duplicates the value into a queue slot. An implementation
/// must report a `size` that does not exceed [`MESSAGE_MAX_SIZE`]; oversized
/// messages are a programmer error per the kernel's error-handling design
/// (category 2), not a runtime `Result`.
pub trait Message: Copy + Send + 'static {
    /// Application-defined signal/id for this message.
    fn id(&self) -> u32;

    /// Size of this concrete message in bytes, used only for tracing.
    /// Defaults to `size_of::<Self>()`.
    fn size(&self) -> usize {
        core::mem::size_of::<Self>()
    }

    /// Convenience header built from [`Message::id`]/[`Message::size`].
    fn header(&self) -> MessageHeader {
        MessageHeader {
            id: self.id(),
            size: self.size() as u8,
        }
    }
}

/// Example message carrying a timestamp alongside a data word. Corresponds
/// to `DataMessage_t` in the C reference kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampedMessage {
    pub id: u32,
    pub timestamp: crate::Tick,
    pub data: u32,
}

impl Message for TimestampedMessage {
    fn id(&self) -> u32 {
        self.id
    }
}

/// Example message that indirects its payload through the memory pool.
/// Corresponds to `MemoryBlockMessage_t` in the C reference kernel: the
/// receiving handler calls `OSMemoryBlockGet(key)` to reach the payload and
/// is responsible for eventually freeing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolKeyMessage {
    pub id: u32,
    pub key: u16,
    pub size: u8,
}

impl Message for PoolKeyMessage {
    fn id(&self) -> u32 {
        self.id
    }

    fn size(&self) -> usize {
        self.size as usize
    }
}
