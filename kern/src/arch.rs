//! Interrupt substrate collaborator contract.
//!
//! Everything in this module is a *stand-in* for hardware the kernel does
//! not implement itself: the interrupt controller, and the assembly that
//! saves/restores a thread's CPU registers across a context switch. spec.md
//! section 1 names these as external collaborators with named contracts; this
//! module is those contracts, plus the one concrete (host-testable)
//! implementation of them this repository ships.
//!
//! A real port targeting actual arcade hardware would replace
//! [`CriticalSection`]'s bookkeeping with real interrupt-mask manipulation,
//! and would give [`SavedContext`] a real machine stack frame instead of the
//! argument/entry bookkeeping used here -- the kernel core above this module
//! does not care which.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicUsize, Ordering};

/// A thread's entry point: takes the opaque argument pointer passed to
/// `create`, and never returns (the trampoline in `thread.rs` handles
/// capturing its return value and transitioning to `Finished`).
pub type ThreadEntry = extern "C" fn(usize);

/// Number of general-purpose register slots in a saved frame.
///
/// Slot `abi::REG_RET0` carries syscall return values; slots `abi::REG_ARG0`
/// and `abi::REG_ARG1` carry syscall arguments, per spec.md section 6.
pub const GP_REGISTERS: usize = 6;

/// An owned, heap-allocated saved-register context for a thread.
///
/// This stands in for the real saved-frame structure a hardware port would
/// use (callee-saved registers, program counter, stack pointer). Since this
/// kernel never actually performs a machine context switch -- that's the
/// interrupt substrate's job -- all that matters here is that each thread
/// gets a stable, uniquely-addressed `SavedContext` the scheduler can
/// recognize, and a `gp` register file the syscall dispatcher can read
/// arguments from and write return values to.
pub struct SavedContext {
    pub gp: [u32; GP_REGISTERS],
    entry: ThreadEntry,
    arg: usize,
}

impl SavedContext {
    pub fn entry(&self) -> ThreadEntry {
        self.entry
    }

    pub fn arg(&self) -> usize {
        self.arg
    }

    pub fn arg0(&self) -> u32 {
        self.gp[abi::REG_ARG0]
    }

    pub fn arg1(&self) -> u32 {
        self.gp[abi::REG_ARG1]
    }

    pub fn set_ret0(&mut self, value: u32) {
        self.gp[abi::REG_RET0] = value;
    }
}

/// A thread's stack, fixed at [`abi::THREAD_STACK_SIZE`] bytes.
pub struct Stack(Box<[u8]>);

impl Stack {
    pub fn new() -> Self {
        Stack(alloc::vec![0u8; abi::THREAD_STACK_SIZE].into_boxed_slice())
    }

    pub fn top(&self) -> *mut u8 {
        // Stacks conventionally grow down from the high end of the region.
        unsafe { self.0.as_ptr().add(self.0.len()) as *mut u8 }
    }
}

/// Allocates a fresh saved context for a thread about to enter `Stopped`.
///
/// Mirrors the collaborator contract `irq_new_state(entry, arg, stack_top)`.
/// A hardware port would use `stack_top` to build an initial stack frame
/// that, on first dispatch, begins executing at `entry`; here we just record
/// the two so the trampoline (see `thread::thread_trampoline`) can be invoked
/// directly.
pub fn irq_new_state(entry: ThreadEntry, arg: usize, _stack_top: *mut u8) -> SavedContext {
    SavedContext {
        gp: [0; GP_REGISTERS],
        entry,
        arg,
    }
}

/// Releases a saved context allocated by [`irq_new_state`].
///
/// Mirrors the collaborator contract `irq_free_state(context)`. Since
/// `SavedContext` owns no external resources beyond its own allocation, this
/// is a plain drop, kept as a named function for symmetry with the C API it
/// replaces.
pub fn irq_free_state(context: SavedContext) {
    drop(context)
}

/// A scoped critical section: interrupts are disabled for its lifetime and
/// restored to their prior state when it is dropped.
///
/// Mirrors the collaborator contract `irq_disable() -> mask` /
/// `irq_restore(mask)`. The sim backend tracks nesting depth rather than a
/// real interrupt mask, which is sufficient to verify that every
/// table-mutating helper acquires and releases the section on every exit
/// path (spec.md section 5).
pub struct CriticalSection {
    _private: (),
}

static NESTING: AtomicUsize = AtomicUsize::new(0);

impl CriticalSection {
    /// Disables interrupts (if not already disabled) and returns a guard
    /// that restores the previous state on drop.
    pub fn enter() -> Self {
        NESTING.fetch_add(1, Ordering::AcqRel);
        CriticalSection { _private: () }
    }

    /// Reports whether a critical section is currently held. Used only by
    /// debug assertions and tests.
    pub fn is_held() -> bool {
        NESTING.load(Ordering::Acquire) > 0
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        NESTING.fetch_sub(1, Ordering::AcqRel);
    }
}
