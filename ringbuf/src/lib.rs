// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for debugging kernel and driver code.
//!
//! This contains an implementation of a static ring buffer designed to be
//! used to instrument arbitrary contexts. While there is nothing to prevent
//! these ring buffers from being left in production code, the design center
//! is primarily around debugging in development: the ring buffers can be
//! walked with a debugger attached to the target, post-mortem or live.
//!
//! ## Constraints
//!
//! The main constraint for a ring buffer is that the type in the ring buffer
//! must implement both `Copy` and `PartialEq`.
//!
//! If you use the variants of the `ringbuf!` macro that leave the name of the
//! data structure implicit, you can only have one per module. (You can lift
//! this constraint by providing a name.)
//!
//! ## Creating a ring buffer
//!
//! Ring buffers are instantiated with the [`ringbuf!`] macro, to which one
//! must provide the type of per-entry payload, the number of entries, and a
//! static initializer.  For example, to define a 16-entry ring buffer with
//! each entry containing a [`core::u32`].
//!
//! ```
//! ringbuf!(u32, 16, 0);
//! ```
//!
//! Ring buffer entries are generated with [`ringbuf_entry!`] specifying a
//! payload of the appropriate type, e.g.:
//!
//! ```
//! ringbuf_entry!(current_priority.0 as u32);
//! ```
//!
//! You can also provide a name for the ring buffer, to distinguish between them
//! if you have more than one:
//!
//! ```
//! ringbuf!(MY_RINGBUF, u32, 16, 0);
//!
//! // ...
//!
//! ringbuf_entry!(MY_RINGBUF, current_priority.0 as u32);
//! ```
//!
//! Payloads can obviously be more sophisticated; for example, here's a payload
//! that names a thread id and the scheduling decision made about it:
//!
//! ```
//! ringbuf!((u32, bool), 128, (0, false));
//! ```

#![cfg_attr(not(test), no_std)]

use core::cell::UnsafeCell;

/// A `static`-friendly cell giving interior mutability without atomics or
/// locks.
///
/// This is sound only because every ring buffer write in this kernel happens
/// from code that already holds the scoped interrupt-disable critical
/// section (see `kern`'s `CriticalSection`), so there is never a concurrent
/// `borrow_mut` in flight. `StaticCell` does not enforce this itself -- it
/// trusts its caller, the same way the teacher's `UShared` trait trusts its
/// implementor.
pub struct StaticCell<T> {
    inner: UnsafeCell<T>,
}

unsafe impl<T> Sync for StaticCell<T> {}

impl<T> StaticCell<T> {
    pub const fn new(value: T) -> Self {
        StaticCell {
            inner: UnsafeCell::new(value),
        }
    }

    /// Borrows the contents mutably.
    ///
    /// # Safety
    ///
    /// The caller must ensure no other borrow of this cell is outstanding,
    /// e.g. by holding the kernel's interrupt-disable critical section for
    /// the duration of the borrow.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn borrow_mut(this: &Self) -> &mut T {
        &mut *this.inner.get()
    }
}

/// Declares a ringbuffer in the current module or context.
///
/// `ringbuf!(NAME, Type, N, expr)` makes a ringbuffer named `NAME`,
/// containing entries of type `Type`, with room for `N` such entries, all of
/// which are initialized to `expr`.
///
/// The resulting ringbuffer will be static, so `NAME` should be uppercase. By
/// convention its name should end in `RINGBUF` so a debugger script can find
/// it by symbol-name pattern.
///
/// The actual type of `name` will be `StaticCell<Ringbuf<T, N>>`.
///
/// To support the common case of having one quickly-installed ringbuffer per
/// module, if you omit the name, it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {
        #[used]
        static $name: $crate::StaticCell<$crate::Ringbuf<$t, $n>> =
            $crate::StaticCell::new($crate::Ringbuf {
                last: None,
                buffer: [$crate::RingbufEntry {
                    line: 0,
                    generation: 0,
                    count: 0,
                    payload: $init,
                }; $n],
            });
    };
    ($t:ty, $n:expr, $init:expr) => {
        $crate::ringbuf!(__RINGBUF, $t, $n, $init);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf {
    ($name:ident, $t:ty, $n:expr, $init:expr) => {};
    ($t:ty, $n:expr, $init:expr) => {};
}

/// Inserts data into a named ringbuffer (which should have been declared with
/// the `ringbuf!` macro).
///
/// `ringbuf_entry!(NAME, expr)` will insert `expr` into the ringbuffer called
/// `NAME`.
///
/// If you declared your ringbuffer without a name, you can also use this
/// without a name, and it will default to `__RINGBUF`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate both buf and payload, without letting them access each
        // other, by evaluating them in a tuple where each cannot
        // accidentally use the other's binding.
        let (p, buf) = ($payload, &$buf);
        // Invoke these functions using slightly weird syntax to avoid
        // accidentally calling a _different_ routine called borrow_mut or
        // entry.
        $crate::Ringbuf::entry(
            unsafe { &mut *$crate::StaticCell::borrow_mut(buf) },
            line!() as u16,
            p,
        );
    }};
    ($payload:expr) => {
        $crate::ringbuf_entry!(__RINGBUF, $payload);
    };
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {};
    ($payload:expr) => {};
}

///
/// The structure of a single [`Ringbuf`] entry, carrying a payload of arbitrary
/// type.  When a ring buffer entry is generated with an identical payload to
/// the most recent entry (in terms of both `line` and `payload`), `count` will
/// be incremented rather than generating a new entry.
///
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

///
/// A ring buffer of parametrized type and size.  In practice, instantiating
/// this directly is strange -- see the [`ringbuf!`] macro.
///
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    pub fn entry(&mut self, line: u16, payload: T) {
        let ndx = match self.last {
            None => 0,
            Some(last) => {
                let ent = &mut self.buffer[last];

                if ent.line == line && ent.payload == payload {
                    // Only reuse this entry if we don't overflow the
                    // count.
                    if let Some(new_count) = ent.count.checked_add(1) {
                        ent.count = new_count;
                        return;
                    }
                }

                if last + 1 >= self.buffer.len() {
                    0
                } else {
                    last + 1
                }
            }
        };

        let ent = &mut self.buffer[ndx];
        ent.line = line;
        ent.payload = payload;
        ent.count = 1;
        ent.generation = ent.generation.wrapping_add(1);

        self.last = Some(ndx);
    }
}
