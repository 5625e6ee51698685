//! Global counters.
//!
//! Spec section 4.4 models these by pointer identity, with an address as
//! their handle. Per the redesign guidance in spec section 9 ("prefer
//! opaque integer handles... over raw pointers"), this implementation uses
//! the counter's table index as its handle instead: unknown handles become
//! a plain bounds check rather than a pointer comparison, and the table can
//! be moved or relocated without invalidating outstanding handles.

use crate::err::KernelError;

/// Fixed-capacity table of owned 32-bit cells.
pub struct CounterTable {
    slots: [Option<u32>; abi::MAX_GLOBAL_COUNTERS],
}

impl CounterTable {
    pub fn new() -> Self {
        CounterTable {
            slots: [None; abi::MAX_GLOBAL_COUNTERS],
        }
    }

    /// Allocates a counter initialized to `value`, returning its handle.
    pub fn init(&mut self, value: u32) -> Result<u32, KernelError> {
        let idx = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(KernelError::Recoverable(-2))?;
        self.slots[idx] = Some(value);
        Ok(idx as u32)
    }

    /// Releases a counter. Unknown handles are silently ignored.
    pub fn free(&mut self, handle: u32) {
        if let Some(slot) = self.slots.get_mut(handle as usize) {
            *slot = None;
        }
    }

    /// Increments a counter. Unknown handles are silently ignored.
    pub fn increment(&mut self, handle: u32) {
        if let Some(Some(v)) = self.slots.get_mut(handle as usize) {
            *v = v.saturating_add(1);
        }
    }

    /// Decrements a counter, saturating at zero. Unknown handles are
    /// silently ignored.
    pub fn decrement(&mut self, handle: u32) {
        if let Some(Some(v)) = self.slots.get_mut(handle as usize) {
            *v = v.saturating_sub(1);
        }
    }

    /// Reads a counter's value, or 0 if the handle is unknown.
    pub fn value(&self, handle: u32) -> u32 {
        self.slots
            .get(handle as usize)
            .and_then(|s| *s)
            .unwrap_or(0)
    }
}

impl Default for CounterTable {
    fn default() -> Self {
        Self::new()
    }
}
