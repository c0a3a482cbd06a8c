use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::ThreadId;
use crate::signal::signal::Signal;
use crate::thread::arena::{ArenaLimits, Request, ThreadArena};
use crate::thread::context::{ActiveGuard, ActiveThread};
use crate::thread::task::{Task, TaskState};

/// Default frame step of a standalone thread (30 fps).
const STANDALONE_FRAME_STEP: f64 = 1.0 / 30.0;
const STANDALONE_LOOP_STALL_LIMIT: usize = 10_000;

/// Outcome of one [`Thread::next`] call.
#[derive(Debug)]
pub enum Step {
    /// The thread or one of its ancestors is paused; nothing ran.
    Paused,
    /// The computation waits for the next frame.
    Frame,
    /// The computation handed over a task that must run in a child thread before it resumes.
    Fork(Task),
    /// The computation returned, was canceled, or the thread is inert.
    Done,
}

/// Scheduler-managed wrapper of one suspendable computation, with its own logical clock.
///
/// A `Thread` is a handle; clones and handles obtained through [`crate::current_thread`] refer to
/// the same record. Records live in an arena owned by the scheduler that created them.
#[derive(Clone)]
pub struct Thread {
    arena: Rc<RefCell<ThreadArena>>,
    id: ThreadId,
    task: Task,
    time: Signal<f64>,
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("task", &self.task)
            .finish()
    }
}

impl Thread {
    /// Wrap `task` in a thread with a private arena, stepping at 30 fps.
    ///
    /// If the task is already driven elsewhere, the error is logged and the returned thread is
    /// inert: stepping it does nothing.
    pub fn new(task: Task) -> Self {
        let arena = Rc::new(RefCell::new(ThreadArena::new(ArenaLimits {
            frame_step: STANDALONE_FRAME_STEP,
            loop_stall_limit: STANDALONE_LOOP_STALL_LIMIT,
        })));
        Self::create_in(&arena, task).0
    }

    /// Like [`Thread::new`] but reports reuse as [`ReelError::Reuse`].
    pub fn try_new(task: Task) -> ReelResult<Self> {
        let arena = Rc::new(RefCell::new(ThreadArena::new(ArenaLimits {
            frame_step: STANDALONE_FRAME_STEP,
            loop_stall_limit: STANDALONE_LOOP_STALL_LIMIT,
        })));
        match Self::create_in(&arena, task) {
            (_, Some(e)) => Err(e),
            (thread, None) => Ok(thread),
        }
    }

    pub(crate) fn create_in(
        arena: &Rc<RefCell<ThreadArena>>,
        task: Task,
    ) -> (Self, Option<ReelError>) {
        let (id, err) = ThreadArena::create(arena, task);
        let (task, time) = {
            let a = arena.borrow();
            match a.get(id) {
                Some(r) => (r.task.clone(), r.time.clone()),
                None => (Task::noop(), Signal::constant(0.0)),
            }
        };
        (
            Self {
                arena: arena.clone(),
                id,
                task,
                time,
            },
            err,
        )
    }

    /// Handle for a live record, if `id` still resolves.
    pub(crate) fn from_arena(arena: Rc<RefCell<ThreadArena>>, id: ThreadId) -> Option<Self> {
        let (task, time) = {
            let a = arena.try_borrow().ok()?;
            let r = a.get(id)?;
            (r.task.clone(), r.time.clone())
        };
        Some(Self {
            arena,
            id,
            task,
            time,
        })
    }

    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// The task this thread drives. For an inert thread this is its private no-op task.
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn is_inert(&self) -> bool {
        self.arena
            .borrow()
            .get(self.id)
            .is_some_and(|r| r.inert)
    }

    /// Resume the computation until it suspends or returns.
    ///
    /// Errors returned by the computation propagate unchanged.
    pub fn next(&self) -> ReelResult<Step> {
        let (inert, paused) = {
            let arena = self.arena.borrow();
            let Some(record) = arena.get(self.id) else {
                return Ok(Step::Done);
            };
            if arena.is_canceled(self.id) {
                return Ok(Step::Done);
            }
            (record.inert, arena.is_paused(self.id))
        };
        if paused {
            return Ok(Step::Paused);
        }
        if inert {
            self.finish();
            return Ok(Step::Done);
        }
        // Canceled before its first resumption: nothing to run, but the record still goes.
        let Some(mut body) = self.task.take_future() else {
            self.finish();
            return Ok(Step::Done);
        };

        let poll = {
            let _active = ActiveGuard::enter(ActiveThread {
                arena: self.arena.clone(),
                id: self.id,
            });
            let mut cx = Context::from_waker(Waker::noop());
            body.as_mut().poll(&mut cx)
        };

        match poll {
            Poll::Ready(result) => {
                drop(body);
                self.finish();
                result.map(|()| Step::Done)
            }
            Poll::Pending => {
                let request = {
                    let mut arena = self.arena.borrow_mut();
                    match arena.get_mut(self.id) {
                        Some(record) => {
                            record.suspensions += 1;
                            Some(record.request.take())
                        }
                        None => None,
                    }
                };
                // `None` means the thread was canceled while it ran.
                let Some(request) = request else {
                    drop(body);
                    return Ok(Step::Done);
                };
                self.task.restore_future(body);
                Ok(match request {
                    Some(Request::Fork(task)) => Step::Fork(task),
                    None => Step::Frame,
                })
            }
        }
    }

    /// Advance the clock by `dt` unless paused, and prune settled children.
    pub fn update(&self, dt: f64) {
        self.arena.borrow_mut().update(self.id, dt);
    }

    /// Queue `task` to start in a new child thread during the current step.
    pub fn spawn(&self, task: Task) -> ReelResult<()> {
        let mut arena = self.arena.borrow_mut();
        let record = arena.get_mut(self.id).ok_or_else(|| {
            ReelError::validation(format!("cannot spawn into settled thread {}", self.id))
        })?;
        record.queue.push(task);
        Ok(())
    }

    /// Tasks queued by `spawn`, oldest first.
    pub(crate) fn drain(&self) -> Vec<Task> {
        self.arena
            .borrow_mut()
            .get_mut(self.id)
            .map(|r| std::mem::take(&mut r.queue))
            .unwrap_or_default()
    }

    /// Attach a thread created by the same scheduler as a child.
    pub fn add(&self, child: &Thread) -> ReelResult<()> {
        if !Rc::ptr_eq(&self.arena, &child.arena) {
            return Err(ReelError::validation(
                "threads from different schedulers cannot be linked",
            ));
        }
        self.arena.borrow_mut().add(self.id, child.id)
    }

    /// Wrap `task` in a new thread and attach it as a child.
    pub(crate) fn adopt(&self, task: Task) -> ReelResult<Thread> {
        let (child, err) = Self::create_in(&self.arena, task);
        if err.is_some() {
            // Inert children still occupy a slot for one step, then finish.
            tracing::debug!(parent = %self.id, child = %child.id, "adopted an inert thread");
        }
        self.add(&child)?;
        Ok(child)
    }

    /// Cancel the computation, detach from the parent, and cancel every descendant.
    pub fn cancel(&self) {
        let garbage = self.arena.borrow_mut().cancel(self.id);
        drop(garbage);
    }

    /// Settle as finished after the computation returned; children are canceled.
    fn finish(&self) {
        let garbage = self.arena.borrow_mut().finish(self.id);
        drop(garbage);
    }

    /// Pause or resume. Pausing also suppresses every descendant.
    pub fn pause(&self, paused: bool) {
        if let Some(record) = self.arena.borrow_mut().get_mut(self.id) {
            record.paused = paused;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.arena.borrow().is_paused(self.id)
    }

    /// `true` if this thread or an ancestor was canceled.
    pub fn is_canceled(&self) -> bool {
        match self.task.state() {
            TaskState::Canceled => true,
            TaskState::Finished => false,
            TaskState::Pending | TaskState::Running => self.arena.borrow().is_canceled(self.id),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.state() == TaskState::Finished
    }

    /// Logical time in seconds. Reading it inside a computed signal registers a dependency.
    pub fn time(&self) -> f64 {
        self.time.get()
    }

    /// Move the clock forward to `seconds`. Earlier instants are ignored; time never decreases.
    pub fn set_time(&self, seconds: f64) {
        if seconds > self.time.peek() {
            self.time.set(seconds);
        }
    }

    /// The logical clock as a signal.
    pub fn time_signal(&self) -> Signal<f64> {
        self.time.clone()
    }

    /// Sum of all frame steps applied so far, without snapping.
    pub fn fixed(&self) -> f64 {
        self.arena.borrow().get(self.id).map_or(0.0, |r| r.fixed)
    }

    /// Duration of one scheduler step in seconds.
    pub fn frame_step(&self) -> f64 {
        self.arena.borrow().limits.frame_step
    }

    pub(crate) fn loop_stall_limit(&self) -> usize {
        self.arena.borrow().limits.loop_stall_limit
    }

    /// Number of times the computation suspended so far.
    pub(crate) fn suspensions(&self) -> u64 {
        self.arena.borrow().get(self.id).map_or(0, |r| r.suspensions)
    }

    pub fn parent(&self) -> Option<ThreadId> {
        self.arena.borrow().get(self.id).and_then(|r| r.parent)
    }

    pub fn children(&self) -> Vec<ThreadId> {
        self.arena
            .borrow()
            .get(self.id)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    /// Unlink the thread driving `task` from its parent so it outlives it.
    pub(crate) fn release(&self, task: &Task) {
        if let Some(id) = task.thread() {
            self.arena.borrow_mut().detach(id);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/thread/thread.rs"]
mod tests;
