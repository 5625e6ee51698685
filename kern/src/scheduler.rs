//! Scheduling policy.
//!
//! `schedule` is a pure function of the thread table and its inputs: it
//! performs no allocation, no I/O, and touches no interrupt state. Its
//! caller is responsible for the critical section and for actually
//! installing the returned context.

use abi::{Priority, ThreadState};

use crate::arch::SavedContext;
use crate::err::KernelError;
use crate::thread::ThreadTable;

/// A scheduling request, as named in spec section 4.2.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Request {
    /// Keep running the current thread if it's still `Running`.
    Current,
    /// Prefer a different `Running` thread in the current priority band.
    Other,
    /// Re-evaluate the table with no preference for or against the current
    /// thread.
    Any,
}

ringbuf!(SCHED_RINGBUF, SchedTrace, 64, SchedTrace::Init);

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum SchedTrace {
    Init,
    InvariantViolation(KernelError),
    StayedCurrent(u32),
    Switched(u32, u32),
}

/// Picks the next thread to run, following spec section 4.2's algorithm.
///
/// If `current` does not match any thread's saved context -- which should
/// be impossible given the table's own invariants -- this returns `current`
/// unchanged rather than panicking, per the error-handling design's treatment
/// of invariant violations as a defensive fallback.
pub fn schedule(
    table: &ThreadTable,
    current: *mut SavedContext,
    request: Request,
) -> *mut SavedContext {
    let current_idx = match table.index_by_context(current) {
        Some(idx) => idx,
        None => {
            let err = KernelError::Unreachable("schedule: current context not found in table");
            ringbuf_entry!(SCHED_RINGBUF, SchedTrace::InvariantViolation(err));
            return current;
        }
    };

    let exclude_current = request == Request::Other;
    let band = max_running_priority(table, current_idx, exclude_current).unwrap_or(Priority::IDLE);

    // CURRENT keeps the current thread running without cycling the band,
    // but only when it is still eligible for that band outright: Running
    // and already at the priority `band` names. A thread that is Running
    // but has fallen below `band` (because a strictly higher-priority
    // thread became Running since its last turn) is not kept -- this is
    // what makes the timer tick's CURRENT request an actual preemption
    // path rather than a no-op, and is what scenario S2 exercises.
    if request == Request::Current {
        let current_thread = table.slot(current_idx).unwrap();
        if current_thread.state == ThreadState::Running && current_thread.priority == band {
            ringbuf_entry!(SCHED_RINGBUF, SchedTrace::StayedCurrent(current_thread.id));
            return current;
        }
    }

    let chosen = next_in_band(table, current_idx, band).unwrap_or(current_idx);
    let chosen_ctx = table.slot(chosen).unwrap().context_ptr();

    ringbuf_entry!(
        SCHED_RINGBUF,
        SchedTrace::Switched(
            table.slot(current_idx).unwrap().id,
            table.slot(chosen).unwrap().id
        )
    );
    chosen_ctx
}

/// Greatest priority among `Running` threads, optionally excluding
/// `exclude_idx`.
fn max_running_priority(
    table: &ThreadTable,
    exclude_idx: usize,
    exclude: bool,
) -> Option<Priority> {
    let mut best: Option<Priority> = None;
    for i in 0..table.len() {
        if exclude && i == exclude_idx {
            continue;
        }
        if let Some(t) = table.slot(i) {
            if t.state == ThreadState::Running {
                best = Some(match best {
                    Some(p) if !t.priority.is_more_important_than(p) => p,
                    _ => t.priority,
                });
            }
        }
    }
    best
}

/// Finds the next `Running` thread in slot order, after `start`, whose
/// priority equals `band`, wrapping around the table exactly once. May
/// return `start` itself if it is the sole member of the band.
fn next_in_band(table: &ThreadTable, start: usize, band: Priority) -> Option<usize> {
    let len = table.len();
    let search_order = (start + 1..len).chain(0..=start);
    for i in search_order {
        if let Some(t) = table.slot(i) {
            if t.state == ThreadState::Running && t.priority == band {
                return Some(i);
            }
        }
    }
    None
}
