// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared ABI: syscall numbers, thread records, tunables and the wire format
//! of the message-reassembly protocol.
//!
//! This crate is `no_std` and has no knowledge of the scheduler's internals;
//! it only defines the types that cross the syscall boundary and the bytes
//! that cross the wire.

#![no_std]

use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Number of thread table slots (compile-time tunable).
pub const MAX_THREADS: usize = 32;
/// Number of global counter slots (compile-time tunable).
pub const MAX_GLOBAL_COUNTERS: usize = 16;
/// Number of semaphore slots (compile-time tunable).
pub const MAX_SEMAPHORES: usize = 16;
/// Number of packet slots held in the transport's receive window.
pub const MAX_OUTSTANDING_PACKETS: usize = 16;
/// Size, in bytes, of a freshly allocated thread stack.
pub const THREAD_STACK_SIZE: usize = 16 * 1024;
/// Maximum bytes in a single transport packet, header included.
pub const MAX_PACKET_LENGTH: usize = 256;

/// Indicates priority of a thread.
///
/// Numerically larger is more important: the scheduler always selects among
/// the threads sharing the greatest `Priority` value that is `Running`. The
/// idle thread is pinned to [`Priority::IDLE`], the minimum representable
/// value, so it can never outrank a normal thread.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default)]
#[repr(transparent)]
pub struct Priority(pub i32);

impl Priority {
    /// Priority reserved for the idle thread. No other thread may use it.
    pub const IDLE: Priority = Priority(i32::MIN);

    /// Checks if `self` is strictly more important than `other`.
    pub fn is_more_important_than(self, other: Self) -> bool {
        self.0 > other.0
    }
}

/// State used to make scheduling decisions about a thread.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ThreadState {
    /// Created but never started, or explicitly stopped.
    Stopped,
    /// Eligible for selection by the scheduler.
    Running,
    /// Entry function returned; still occupies a table slot until joined.
    Finished,
    /// Finished and already joined; awaiting `destroy`.
    Zombie,
    /// Blocked in a semaphore acquire or a join.
    Waiting,
}

impl ThreadState {
    pub fn is_alive(self) -> bool {
        matches!(
            self,
            ThreadState::Stopped | ThreadState::Running | ThreadState::Waiting
        )
    }
}

/// Number of bytes a thread name may hold, not counting the terminator.
pub const THREAD_NAME_CAPACITY: usize = 63;

/// A bounded, `Copy` thread name, as stored in the thread table.
///
/// Longer names are truncated at construction; this mirrors the C
/// `char name[64]` field the thread descriptor is modeled on.
#[derive(Copy, Clone)]
pub struct ThreadName {
    bytes: [u8; THREAD_NAME_CAPACITY],
    len: u8,
}

impl ThreadName {
    pub const EMPTY: ThreadName = ThreadName {
        bytes: [0; THREAD_NAME_CAPACITY],
        len: 0,
    };

    pub fn new(s: &str) -> Self {
        let mut bytes = [0u8; THREAD_NAME_CAPACITY];
        let truncated = truncate_on_boundary(s, THREAD_NAME_CAPACITY);
        bytes[..truncated.len()].copy_from_slice(truncated.as_bytes());
        ThreadName {
            bytes,
            len: truncated.len() as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        // Safety/correctness: bytes were produced by `truncate_on_boundary`,
        // which only ever slices at a UTF-8 char boundary.
        core::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl Default for ThreadName {
    fn default() -> Self {
        Self::EMPTY
    }
}

fn truncate_on_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Snapshot returned by the `info` operation.
#[derive(Copy, Clone, Default)]
pub struct ThreadInfo {
    pub name: ThreadName,
    pub priority: Priority,
    pub alive: bool,
    pub running: bool,
}

/// Sentinel thread id meaning "not found" / "no such thread".
pub const THREAD_ID_NONE: u32 = 0;

/// Enumeration of syscall numbers, matching spec.md section 4.3.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Sysnum {
    GlobalCounterIncrement = 0,
    GlobalCounterDecrement = 1,
    GlobalCounterValue = 2,
    ThreadYield = 3,
    ThreadStart = 4,
    ThreadStop = 5,
    ThreadPriority = 6,
    ThreadId = 7,
}

impl core::convert::TryFrom<u32> for Sysnum {
    type Error = ();

    fn try_from(x: u32) -> Result<Self, Self::Error> {
        match x {
            0 => Ok(Self::GlobalCounterIncrement),
            1 => Ok(Self::GlobalCounterDecrement),
            2 => Ok(Self::GlobalCounterValue),
            3 => Ok(Self::ThreadYield),
            4 => Ok(Self::ThreadStart),
            5 => Ok(Self::ThreadStop),
            6 => Ok(Self::ThreadPriority),
            7 => Ok(Self::ThreadId),
            _ => Err(()),
        }
    }
}

/// Index of the saved-frame register slot used for syscall return values.
pub const REG_RET0: usize = 0;
/// Index of the saved-frame register slot used for the first syscall argument.
pub const REG_ARG0: usize = 4;
/// Index of the saved-frame register slot used for the second syscall argument.
pub const REG_ARG1: usize = 5;

/// Number of bytes in a fragment header, fixed by the wire format.
pub const FRAGMENT_HEADER_LEN: usize = 8;

/// Sequence number reserved to mean "invalid"; never assigned to a message.
pub const SEQUENCE_INVALID: u16 = 0;

/// On-wire header prefixing every message fragment (spec.md section 3).
///
/// All fields are little-endian `u16`s, giving an 8-byte header with no
/// padding. `Unaligned` lets this be read out of a raw packet buffer of
/// arbitrary alignment.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, FromBytes, IntoBytes, Unaligned, Immutable, KnownLayout,
)]
#[repr(C)]
pub struct FragmentHeader {
    pub msg_type: U16,
    pub sequence: U16,
    pub total_length: U16,
    pub offset: U16,
}

impl FragmentHeader {
    pub fn new(msg_type: u16, sequence: u16, total_length: u16, offset: u16) -> Self {
        FragmentHeader {
            msg_type: U16::new(msg_type),
            sequence: U16::new(sequence),
            total_length: U16::new(total_length),
            offset: U16::new(offset),
        }
    }
}

const _: () = assert!(core::mem::size_of::<FragmentHeader>() == FRAGMENT_HEADER_LEN);

/// Error codes for the messaging API, matching spec.md section 6.
pub mod msg_error {
    pub const OK: i32 = 0;
    pub const TOO_LARGE: i32 = -3;
    pub const SEND_FAILED: i32 = -4;
    pub const NOT_READY: i32 = -5;
}
