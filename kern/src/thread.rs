//! Thread table and lifecycle.
//!
//! All mutation here is expected to happen under the caller's
//! [`crate::arch::CriticalSection`]; this module does not acquire one
//! itself, the same way the teacher's task table mutators trusted their
//! caller to already be running with interrupts off.

use alloc::boxed::Box;

use abi::{Priority, ThreadInfo, ThreadName, ThreadState};

use crate::arch::{self, SavedContext, Stack, ThreadEntry};
use crate::err::KernelError;
use crate::scheduler::Request;

/// A thread's saved context, owned unless the thread is the main thread, in
/// which case the context belongs to whatever booted the kernel and must
/// survive `destroy`.
enum ContextSlot {
    Owned(Box<SavedContext>),
    External(*mut SavedContext),
}

impl ContextSlot {
    fn as_ptr(&self) -> *mut SavedContext {
        match self {
            ContextSlot::Owned(b) => &**b as *const SavedContext as *mut SavedContext,
            ContextSlot::External(p) => *p,
        }
    }

    fn as_mut(&mut self) -> &mut SavedContext {
        // Safety: both variants point at a live SavedContext for as long as
        // the owning Thread exists; External contexts are promised by their
        // creator to outlive the table.
        unsafe { &mut *self.as_ptr() }
    }
}

enum StackSlot {
    Owned(Stack),
    External,
}

/// The arguments a freshly allocated thread's trampoline needs once it is
/// actually dispatched onto the CPU. Boxed and leaked into the context's
/// argument slot at `create` time; reclaimed by [`enter_thread`] the first
/// (and only) time the trampoline runs.
struct TrampolineArgs {
    entry: ThreadEntry,
    arg: usize,
    id: u32,
}

/// Hardware-invoked entry point for a freshly started thread.
///
/// A real port's interrupt return path jumps here with the packed pointer
/// produced by `create` as its single argument. This function is glue, not
/// kernel logic: everything it does that matters to the kernel's own
/// invariants is delegated to the testable [`finish_thread`] below. It is
/// never invoked by this crate's own tests, the same way
/// the teacher's `arch::arm_m` entry sequences are exercised only on real
/// hardware.
///
/// # Safety
/// `packed` must be a pointer previously produced by `create` for this
/// thread, and must not have been passed to this function before.
pub unsafe extern "C" fn thread_trampoline(packed: usize) {
    let args = Box::from_raw(packed as *mut TrampolineArgs);
    (args.entry)(args.arg);
    // A real port would now call back into the kernel core (through a
    // syscall-like trap) to run `finish_thread` and reschedule. This
    // function itself never returns to its caller.
    loop {}
}

/// A single thread table entry.
pub struct Thread {
    pub name: ThreadName,
    pub id: u32,
    pub priority: Priority,
    pub state: ThreadState,
    /// Weak handle to the semaphore this thread is blocked on, if any.
    pub semaphore: Option<u32>,
    /// Id of the thread this one is joining, if any.
    pub join_target: Option<u32>,
    pub is_main: bool,
    context: ContextSlot,
    stack: StackSlot,
    pub return_value: usize,
}

impl Thread {
    pub fn context_ptr(&self) -> *mut SavedContext {
        self.context.as_ptr()
    }

    pub fn context_mut(&mut self) -> &mut SavedContext {
        self.context.as_mut()
    }
}

/// Fixed-capacity table of thread descriptors.
pub struct ThreadTable {
    slots: [Option<Thread>; abi::MAX_THREADS],
    next_id: u32,
}

ringbuf!(THREAD_RINGBUF, (u32, abi::ThreadState), 64, (0, abi::ThreadState::Stopped));

impl ThreadTable {
    pub fn new() -> Self {
        ThreadTable {
            slots: core::array::from_fn(|_| None),
            next_id: 1,
        }
    }

    fn alloc_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = if self.next_id == u32::MAX {
                1
            } else {
                self.next_id + 1
            };
            if id != abi::THREAD_ID_NONE {
                return id;
            }
        }
    }

    fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        if id == abi::THREAD_ID_NONE {
            return None;
        }
        self.slots
            .iter()
            .position(|s| matches!(s, Some(t) if t.id == id))
    }

    /// Installs the thread representing whatever execution context booted
    /// the kernel. Its stack and saved context are owned externally: they
    /// must outlive the table and are never freed by `destroy`.
    pub fn install_main(
        &mut self,
        name: &str,
        priority: Priority,
        context: *mut SavedContext,
    ) -> u32 {
        let id = self.alloc_id();
        let idx = self
            .first_empty()
            .expect("thread table has no room for the main thread");
        self.slots[idx] = Some(Thread {
            name: ThreadName::new(name),
            id,
            priority,
            state: ThreadState::Running,
            semaphore: None,
            join_target: None,
            is_main: true,
            context: ContextSlot::External(context),
            stack: StackSlot::External,
            return_value: 0,
        });
        id
    }

    /// Allocates a descriptor in `Stopped` with a freshly allocated stack
    /// and a saved context whose entry is [`thread_trampoline`].
    pub fn create(
        &mut self,
        name: &str,
        entry: ThreadEntry,
        arg: usize,
        priority: Priority,
    ) -> Result<u32, KernelError> {
        let idx = self.first_empty().ok_or(KernelError::THREAD_TABLE_FULL)?;
        let id = self.alloc_id();
        let stack = Stack::new();
        let trampoline_args = Box::into_raw(Box::new(TrampolineArgs { entry, arg, id }));
        let context = arch::irq_new_state(thread_trampoline, trampoline_args as usize, stack.top());

        self.slots[idx] = Some(Thread {
            name: ThreadName::new(name),
            id,
            priority,
            state: ThreadState::Stopped,
            semaphore: None,
            join_target: None,
            is_main: false,
            context: ContextSlot::Owned(Box::new(context)),
            stack: StackSlot::Owned(stack),
            return_value: 0,
        });

        ringbuf_entry!(THREAD_RINGBUF, (id, ThreadState::Stopped));
        Ok(id)
    }

    /// Frees the descriptor outright. No join is performed; a thread
    /// holding semaphore references is not diagnosed, per the caller's
    /// responsibility documented alongside the rest of this API.
    ///
    /// The main thread and the idle thread are permanent fixtures of the
    /// table (spec section 3: "exactly one descriptor has main=true... for
    /// the lifetime of the table" and "exactly one descriptor has
    /// priority=MIN... always in state Running"), so destroying either is
    /// rejected outright rather than honored: main can never be recreated
    /// once its slot is cleared, and clearing idle could leave the
    /// scheduler with no guaranteed-Running thread to fall back on.
    pub fn destroy(&mut self, id: u32) -> Result<(), KernelError> {
        let idx = self.index_of(id).ok_or(KernelError::UNKNOWN_THREAD)?;
        let t = self.slots[idx].as_ref().unwrap();
        if t.is_main || t.priority == Priority::IDLE {
            return Err(KernelError::PERMANENT_THREAD);
        }
        self.slots[idx] = None;
        ringbuf_entry!(THREAD_RINGBUF, (id, ThreadState::Zombie));
        Ok(())
    }

    pub fn start(&mut self, id: u32) -> bool {
        if let Some(idx) = self.index_of(id) {
            let t = self.slots[idx].as_mut().unwrap();
            if t.state == ThreadState::Stopped {
                t.state = ThreadState::Running;
                ringbuf_entry!(THREAD_RINGBUF, (id, ThreadState::Running));
                return true;
            }
        }
        false
    }

    pub fn stop(&mut self, id: u32) -> bool {
        if let Some(idx) = self.index_of(id) {
            let t = self.slots[idx].as_mut().unwrap();
            if t.state == ThreadState::Running {
                t.state = ThreadState::Stopped;
                ringbuf_entry!(THREAD_RINGBUF, (id, ThreadState::Stopped));
                return true;
            }
        }
        false
    }

    pub fn set_priority(&mut self, id: u32, priority: Priority) -> bool {
        if let Some(idx) = self.index_of(id) {
            self.slots[idx].as_mut().unwrap().priority = priority;
            true
        } else {
            false
        }
    }

    pub fn info(&self, id: u32) -> ThreadInfo {
        match self.index_of(id).and_then(|idx| self.slots[idx].as_ref()) {
            Some(t) => ThreadInfo {
                name: t.name,
                priority: t.priority,
                alive: t.state.is_alive(),
                running: t.state == ThreadState::Running,
            },
            None => ThreadInfo::default(),
        }
    }

    /// Id of the thread whose context pointer is `context`, or
    /// [`abi::THREAD_ID_NONE`] if no such thread exists.
    pub fn id_of_context(&self, context: *mut SavedContext) -> u32 {
        self.slots
            .iter()
            .flatten()
            .find(|t| t.context_ptr() == context)
            .map(|t| t.id)
            .unwrap_or(abi::THREAD_ID_NONE)
    }

    /// Moves a thread from `Running` to `Waiting` on the given semaphore
    /// handle. Used by [`crate::semaphore`].
    pub fn block_on_semaphore(&mut self, id: u32, handle: u32) {
        if let Some(idx) = self.index_of(id) {
            let t = self.slots[idx].as_mut().unwrap();
            t.state = ThreadState::Waiting;
            t.semaphore = Some(handle);
        }
    }

    /// Lowest-slot-index thread currently `Waiting` on `handle`, if any.
    pub fn find_waiting_on(&self, handle: u32) -> Option<u32> {
        self.slots
            .iter()
            .flatten()
            .find(|t| t.state == ThreadState::Waiting && t.semaphore == Some(handle))
            .map(|t| t.id)
    }

    /// Wakes a thread previously blocked by [`Self::block_on_semaphore`].
    pub fn wake(&mut self, id: u32) {
        if let Some(idx) = self.index_of(id) {
            let t = self.slots[idx].as_mut().unwrap();
            t.state = ThreadState::Running;
            t.semaphore = None;
        }
    }

    /// Blocks `joiner` until `target` finishes, per the data model's
    /// Finished->Zombie-when-joined transition.
    ///
    /// If `target` has already finished, this collects it into `Zombie`
    /// immediately and returns [`Request::Current`] -- no reschedule is
    /// needed. Otherwise it moves `joiner` Running->Waiting with
    /// `join_target` set and returns [`Request::Other`]; the waiter is woken
    /// by [`finish_thread`] once `target` actually finishes. An unknown
    /// `target` is a no-op, consistent with this table's treatment of
    /// unknown handles elsewhere.
    pub fn join(&mut self, joiner: u32, target: u32) -> Request {
        match self.index_of(target) {
            Some(idx) if self.slots[idx].as_ref().unwrap().state == ThreadState::Finished => {
                self.slots[idx].as_mut().unwrap().state = ThreadState::Zombie;
                Request::Current
            }
            Some(_) => {
                if let Some(jidx) = self.index_of(joiner) {
                    let t = self.slots[jidx].as_mut().unwrap();
                    t.state = ThreadState::Waiting;
                    t.join_target = Some(target);
                }
                Request::Other
            }
            None => Request::Current,
        }
    }

    /// The return value recorded by [`finish_thread`], or 0 if `id` is
    /// unknown or has not finished yet.
    pub fn return_value(&self, id: u32) -> usize {
        self.index_of(id)
            .and_then(|idx| self.slots[idx].as_ref())
            .map(|t| t.return_value)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, idx: usize) -> Option<&Thread> {
        self.slots[idx].as_ref()
    }

    pub fn slot_mut(&mut self, idx: usize) -> Option<&mut Thread> {
        self.slots[idx].as_mut()
    }

    pub fn index_by_context(&self, context: *mut SavedContext) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(t) if t.context_ptr() == context))
    }
}

impl Default for ThreadTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Records a thread's entry-function return value and transitions it to
/// `Finished`. Called by a real port from within the trampoline, after
/// `entry(arg)` returns; factored out so it is unit-testable without
/// actually running a thread (mirrors how the teacher splits its unsafe
/// arch-facing `syscall_entry` from the testable `safe_syscall_entry`).
///
/// If another thread is already `Waiting` on `id` via [`ThreadTable::join`],
/// that thread is woken directly and `id`'s descriptor is collected straight
/// into `Zombie`, skipping the intermediate state a later, unrelated `join`
/// would otherwise have to observe.
pub fn finish_thread(table: &mut ThreadTable, id: u32, return_value: usize) {
    if let Some(idx) = table.index_of(id) {
        let t = table.slots[idx].as_mut().unwrap();
        t.return_value = return_value;
        t.state = ThreadState::Finished;
        ringbuf_entry!(THREAD_RINGBUF, (id, ThreadState::Finished));
    }

    if let Some(joiner_idx) = table
        .slots
        .iter()
        .position(|s| matches!(s, Some(t) if t.state == ThreadState::Waiting && t.join_target == Some(id)))
    {
        let joiner = table.slots[joiner_idx].as_mut().unwrap();
        joiner.state = ThreadState::Running;
        joiner.join_target = None;
        if let Some(idx) = table.index_of(id) {
            table.slots[idx].as_mut().unwrap().state = ThreadState::Zombie;
        }
    }
}
