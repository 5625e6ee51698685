//! Kernel time.
//!
//! The kernel only knows about a monotonic tick counter driven by an
//! external timer interrupt; it has no notion of wall-clock time or of the
//! duration a tick represents.

/// A monotonic kernel timestamp, measured in an arbitrary tick unit.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
#[repr(transparent)]
pub struct Tick(u64);

impl Tick {
    pub const ZERO: Tick = Tick(0);

    pub fn next(self) -> Tick {
        Tick(self.0.wrapping_add(1))
    }
}

impl From<u64> for Tick {
    fn from(v: u64) -> Self {
        Tick(v)
    }
}

impl From<Tick> for u64 {
    fn from(v: Tick) -> Self {
        v.0
    }
}
