//! Access to the thread whose computation is currently being resumed.
//!
//! `Thread::next` installs the active thread for the duration of one resumption; the free
//! functions here are how a computation talks back to its scheduler.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::ThreadId;
use crate::thread::arena::{Request, ThreadArena};
use crate::thread::task::Task;
use crate::thread::thread::Thread;

#[derive(Clone)]
pub(crate) struct ActiveThread {
    pub(crate) arena: Rc<RefCell<ThreadArena>>,
    pub(crate) id: ThreadId,
}

thread_local! {
    static ACTIVE: RefCell<Option<ActiveThread>> = const { RefCell::new(None) };
}

/// Installs an active thread and restores the previous one on drop.
pub(crate) struct ActiveGuard {
    prev: Option<ActiveThread>,
}

impl ActiveGuard {
    pub(crate) fn enter(active: ActiveThread) -> Self {
        let prev = ACTIVE.with(|a| a.borrow_mut().replace(active));
        Self { prev }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        let _ = ACTIVE.try_with(|a| *a.borrow_mut() = prev);
    }
}

fn active() -> Option<ActiveThread> {
    ACTIVE.with(|a| a.borrow().clone())
}

fn require(operation: &'static str) -> ReelResult<ActiveThread> {
    active().ok_or_else(|| ReelError::unavailable(operation))
}

/// Handle to the thread running the current computation.
pub fn current_thread() -> ReelResult<Thread> {
    let active = require("current_thread")?;
    Thread::from_arena(active.arena, active.id)
        .ok_or_else(|| ReelError::unavailable("current_thread"))
}

/// Logical time of the active thread, if any.
pub(crate) fn current_time() -> Option<f64> {
    current_thread().ok().map(|t| t.time_signal().peek())
}

/// Start `task` in a new child thread within this step, without suspending the caller.
pub fn spawn(task: Task) -> ReelResult<()> {
    let active = require("spawn")?;
    let mut arena = active.arena.borrow_mut();
    let record = arena
        .get_mut(active.id)
        .ok_or_else(|| ReelError::unavailable("spawn"))?;
    record.queue.push(task);
    Ok(())
}

/// Suspend until the next scheduler step.
pub fn next_frame() -> NextFrame {
    NextFrame { yielded: false }
}

/// Hand `task` to a new child thread, which runs before the caller resumes in the same step.
pub fn fork(task: Task) -> Fork {
    Fork { task: Some(task) }
}

/// Future returned by [`next_frame`].
pub struct NextFrame {
    yielded: bool,
}

impl Future for NextFrame {
    type Output = ReelResult<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.yielded {
            return Poll::Ready(Ok(()));
        }
        if active().is_none() {
            return Poll::Ready(Err(ReelError::unavailable("next_frame")));
        }
        this.yielded = true;
        Poll::Pending
    }
}

/// Future returned by [`fork`].
pub struct Fork {
    task: Option<Task>,
}

impl Future for Fork {
    type Output = ReelResult<()>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(task) = this.task.take() else {
            return Poll::Ready(Ok(()));
        };
        let Some(active) = active() else {
            return Poll::Ready(Err(ReelError::unavailable("fork")));
        };
        let mut arena = active.arena.borrow_mut();
        let Some(record) = arena.get_mut(active.id) else {
            return Poll::Ready(Err(ReelError::unavailable("fork")));
        };
        record.request = Some(Request::Fork(task));
        Poll::Pending
    }
}

#[cfg(test)]
#[path = "../../tests/unit/thread/context.rs"]
mod tests;
