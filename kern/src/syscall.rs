//! Syscall dispatcher.
//!
//! Entered from two sources, per spec section 4.3: the timer tick handler,
//! which always issues `Request::Current`, and the software trap handler,
//! which selects on a numeric syscall in 0..7. Both ultimately call
//! [`dispatch`], mutate thread/counter/semaphore state, then invoke
//! [`crate::scheduler::schedule`] with the request the table indicates.

use core::convert::TryFrom;

use abi::{Priority, Sysnum};

use crate::arch::{CriticalSection, SavedContext};
use crate::counter::CounterTable;
use crate::scheduler::{self, Request};
use crate::semaphore::SemaphoreTable;
use crate::thread::ThreadTable;
use crate::time::Tick;

ringbuf!(SYSCALL_RINGBUF, (u32, u32), 64, (0, 0));

/// Handles a single software trap.
///
/// # Safety
/// `current` must point at a live [`SavedContext`] belonging to a thread
/// presently in the table, i.e. the pointer the trap entry sequence was
/// handed by the hardware it just trapped out of.
pub unsafe fn trap_entry(
    tasks: &mut ThreadTable,
    counters: &mut CounterTable,
    semaphores: &mut SemaphoreTable,
    current: *mut SavedContext,
    sysnum: u32,
) -> *mut SavedContext {
    let _cs = CriticalSection::enter();
    let ctx = &mut *current;
    ringbuf_entry!(SYSCALL_RINGBUF, (sysnum, ctx.arg0()));
    let request = safe_trap_entry(tasks, counters, semaphores, ctx, sysnum);
    scheduler::schedule(tasks, current, request)
}

/// The syscall effects, factored out so they can be unit tested without an
/// actual saved-register frame pointer in play.
fn safe_trap_entry(
    tasks: &mut ThreadTable,
    counters: &mut CounterTable,
    semaphores: &mut SemaphoreTable,
    ctx: &mut SavedContext,
    sysnum: u32,
) -> Request {
    let _ = semaphores; // reserved for a future syscall surface; see semaphore.rs
    match Sysnum::try_from(sysnum) {
        Ok(Sysnum::GlobalCounterIncrement) => {
            counters.increment(ctx.arg0());
            Request::Current
        }
        Ok(Sysnum::GlobalCounterDecrement) => {
            counters.decrement(ctx.arg0());
            Request::Current
        }
        Ok(Sysnum::GlobalCounterValue) => {
            ctx.set_ret0(counters.value(ctx.arg0()));
            Request::Current
        }
        Ok(Sysnum::ThreadYield) => Request::Other,
        Ok(Sysnum::ThreadStart) => {
            tasks.start(ctx.arg0());
            Request::Any
        }
        Ok(Sysnum::ThreadStop) => {
            tasks.stop(ctx.arg0());
            Request::Any
        }
        Ok(Sysnum::ThreadPriority) => {
            tasks.set_priority(ctx.arg0(), Priority(ctx.arg1() as i32));
            Request::Any
        }
        Ok(Sysnum::ThreadId) => {
            ctx.set_ret0(tasks.id_of_context(ctx as *mut SavedContext));
            Request::Current
        }
        Err(()) => Request::Current,
    }
}

/// Handles the timer tick: the preemption path. The current thread keeps
/// running if it's still `Running`; otherwise the scheduler picks another.
pub fn tick(tasks: &ThreadTable, current: *mut SavedContext, _now: Tick) -> *mut SavedContext {
    let _cs = CriticalSection::enter();
    scheduler::schedule(tasks, current, Request::Current)
}
