//! Common error-handling support.
//!
//! Most of the kernel's fallible surface is expected to fail in ordinary,
//! recoverable ways (an unknown thread id, a full thread table, a message
//! too large for the receive buffer): those are `Recoverable` and carry a
//! negative `i32` code the way the syscall ABI returns them to callers.
//! [`KernelError::Unreachable`] exists for exactly one case this kernel
//! actually hits: the scheduler finding no runnable thread, which can only
//! happen if the idle thread itself has been corrupted or destroyed.

use core::fmt;

/// A kernel-internal error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KernelError {
    /// An ordinary, expected failure. The payload is the negative error
    /// code handed back across the syscall boundary.
    Recoverable(i32),
    /// A condition that should be impossible if the kernel's own invariants
    /// hold. Reaching this is a kernel bug, not a misbehaving caller.
    Unreachable(&'static str),
}

impl KernelError {
    pub const UNKNOWN_THREAD: KernelError = KernelError::Recoverable(-1);
    pub const THREAD_TABLE_FULL: KernelError = KernelError::Recoverable(-2);
    pub const TOO_LARGE: KernelError = KernelError::Recoverable(abi::msg_error::TOO_LARGE);
    pub const SEND_FAILED: KernelError = KernelError::Recoverable(abi::msg_error::SEND_FAILED);
    pub const NOT_READY: KernelError = KernelError::Recoverable(abi::msg_error::NOT_READY);
    /// `destroy` was called on the main or idle thread, both permanent
    /// fixtures of the table per spec section 3.
    pub const PERMANENT_THREAD: KernelError = KernelError::Recoverable(-6);

    /// The code to hand back to a caller across the syscall boundary, with
    /// `Unreachable` collapsed to a generic negative code (this kernel is
    /// expected to never actually construct one outside tests).
    pub fn code(self) -> i32 {
        match self {
            KernelError::Recoverable(code) => code,
            KernelError::Unreachable(_) => i32::MIN,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::Recoverable(code) => write!(f, "recoverable error {}", code),
            KernelError::Unreachable(msg) => write!(f, "unreachable: {}", msg),
        }
    }
}
