//! Kernel bring-up.
//!
//! Unlike the teacher's app-header-driven boot (which derives a fixed task
//! set from a ROM-baked descriptor table), this kernel's thread set is
//! built at runtime: the spec requires `create`/`destroy` to work on a live
//! table, so there is no equivalent of a static task table to validate and
//! load. What's left of "startup" is: install the booting context as the
//! main thread, create and start the idle thread, and hand back a [`Kernel`]
//! ready to take syscalls and timer ticks.

use abi::Priority;

use crate::arch::{self, CriticalSection, SavedContext};
use crate::counter::CounterTable;
use crate::scheduler::{self, Request};
use crate::semaphore::SemaphoreTable;
use crate::syscall;
use crate::thread::ThreadTable;
use crate::time::Tick;

/// Bundles the tables a running kernel needs: threads, counters,
/// semaphores, and the current tick. Owns no transport or message state --
/// those are independent of scheduling and are used directly through
/// [`crate::message`].
pub struct Kernel {
    pub tasks: ThreadTable,
    pub counters: CounterTable,
    pub semaphores: SemaphoreTable,
    pub now: Tick,
}

extern "C" fn idle_entry(_: usize) {
    // A tight loop that immediately yields, per spec section 9's design
    // notes. On real hardware this is the body a thread actually executes;
    // here it documents intent but is never invoked, the same way
    // `thread::thread_trampoline` is never invoked by this crate's tests.
    loop {}
}

impl Kernel {
    /// Builds a fresh kernel: installs `main_context` as the main thread,
    /// then creates and starts the idle thread.
    ///
    /// `main_context` must point at a [`SavedContext`] that outlives the
    /// returned `Kernel` -- ownership stays with whoever booted the system.
    pub fn new(main_context: *mut SavedContext) -> Self {
        let _cs = CriticalSection::enter();
        let mut tasks = ThreadTable::new();
        tasks.install_main("main", Priority(0), main_context);

        let idle_id = tasks
            .create("idle", idle_entry, 0, Priority::IDLE)
            .expect("thread table has no room for the idle thread");
        tasks.start(idle_id);

        Kernel {
            tasks,
            counters: CounterTable::new(),
            semaphores: SemaphoreTable::new(),
            now: Tick::ZERO,
        }
    }

    /// Handles the timer tick: advances kernel time and runs the
    /// preemption path.
    pub fn on_tick(&mut self, current: *mut SavedContext) -> *mut SavedContext {
        self.now = self.now.next();
        syscall::tick(&self.tasks, current, self.now)
    }

    /// Handles a software trap.
    ///
    /// # Safety
    /// See [`syscall::trap_entry`].
    pub unsafe fn on_trap(&mut self, current: *mut SavedContext, sysnum: u32) -> *mut SavedContext {
        syscall::trap_entry(
            &mut self.tasks,
            &mut self.counters,
            &mut self.semaphores,
            current,
            sysnum,
        )
    }

    /// Runs the scheduler directly with an explicit [`Request`], bypassing
    /// the syscall dispatcher. Used by semaphore/join-style kernel API
    /// entry points that mutate thread state themselves and then need a
    /// reschedule, the same way `create`/`destroy`/`info` are called
    /// outside the trap path under their own critical section.
    pub fn reschedule(&self, current: *mut SavedContext, request: Request) -> *mut SavedContext {
        let _cs = CriticalSection::enter();
        scheduler::schedule(&self.tasks, current, request)
    }
}

/// Allocates a [`SavedContext`] representing the currently executing
/// context and leaks it, returning a stable pointer suitable for
/// [`Kernel::new`]. Host tests use this to synthesize a "main thread"
/// without real hardware behind it.
pub fn bootstrap_context() -> *mut SavedContext {
    extern "C" fn noop_entry(_: usize) {}
    let ctx = arch::irq_new_state(noop_entry, 0, core::ptr::null_mut());
    alloc::boxed::Box::into_raw(alloc::boxed::Box::new(ctx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_kernel_has_main_and_idle_running() {
        let main_ctx = bootstrap_context();
        let kernel = Kernel::new(main_ctx);
        assert_eq!(kernel.tasks.len(), abi::MAX_THREADS);
        let idle_running = (0..kernel.tasks.len())
            .filter_map(|i| kernel.tasks.slot(i))
            .any(|t| t.priority == Priority::IDLE && t.state == abi::ThreadState::Running);
        assert!(idle_running);
    }

    #[test]
    fn scenario_s3_only_idle_running_schedules_idle() {
        let main_ctx = bootstrap_context();
        let mut kernel = Kernel::new(main_ctx);
        // Stop the main thread so only idle remains Running.
        let main_id = kernel.tasks.id_of_context(main_ctx);
        kernel.tasks.stop(main_id);

        let idle_ctx = (0..kernel.tasks.len())
            .filter_map(|i| kernel.tasks.slot(i))
            .find(|t| t.priority == Priority::IDLE)
            .unwrap()
            .context_ptr();

        let next = kernel.reschedule(idle_ctx, Request::Other);
        assert_eq!(next, idle_ctx);
    }
}
