//! Arcade microkernel core.
//!
//! This crate implements the scheduler, syscall dispatcher, global counters,
//! semaphores, and message-reassembly codec that make up the portable core
//! of the kernel. It knows nothing about the concrete arcade hardware it
//! will eventually run on: the interrupt controller and the machine context
//! switch are collaborators it calls through the small interface in
//! [`arch`], so this crate builds and its tests run on the host.
//!
//! # Algorithm naivety principles
//!
//! Like the kernel this one is descended from, this code favors simple,
//! easily audited algorithms over clever ones:
//!
//! 1. Use safe Rust for as much as possible.
//! 2. Use easily understood and debugged algorithms.
//! 3. Revisit these decisions only if they become measured performance
//!    problems.
//!
//! The thread table is small (at most [`abi::MAX_THREADS`] entries) and
//! scheduling decisions are made a handful of times per tick, so an O(n)
//! scan over the table is the right tool, not a premature optimization
//! target.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
extern crate ringbuf;

pub mod arch;
pub mod counter;
pub mod err;
pub mod message;
pub mod scheduler;
pub mod semaphore;
pub mod startup;
pub mod syscall;
pub mod thread;
pub mod time;
pub mod transport;

pub use err::KernelError;
