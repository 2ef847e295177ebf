use core::fmt;

/// Monotonic 1 ms tick counter, incremented once per `SysTick`. Wraps on
/// overflow rather than panicking — a wrapped comparison would need to be
/// reintroduced if this kernel ever ran long enough for it to matter, which
/// at 1 ms/tick and `u32` is about 49 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Tick(u32);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub const fn new(ticks: u32) -> Self {
        Tick(ticks)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Advance by one tick, wrapping on overflow.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Ticks elapsed since an earlier reading, handling one wraparound.
    pub fn elapsed_since(self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Tick {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=u32}ms", self.0);
    }
}
