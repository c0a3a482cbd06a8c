use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::{TaskId, ThreadId};
use crate::thread::arena::ThreadArena;
use crate::thread::context;

/// Boxed body of a suspendable computation.
pub type TaskFuture = Pin<Box<dyn Future<Output = ReelResult<()>>>>;

/// Lifecycle of one computation instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Created, not yet started.
    Pending,
    /// Driven by a thread or awaited inline.
    Running,
    /// Returned normally (or with an error).
    Finished,
    /// Forced to return early.
    Canceled,
}

struct TaskCell {
    id: TaskId,
    label: Cow<'static, str>,
    future: RefCell<Option<TaskFuture>>,
    claimed: Cell<bool>,
    state: Cell<TaskState>,
    cancel_requested: Cell<bool>,
    settled_at: Cell<Option<f64>>,
    owner: RefCell<Option<(Weak<RefCell<ThreadArena>>, ThreadId)>>,
}

/// A suspendable computation instance.
///
/// Cloning a `Task` yields another handle to the same instance, which is how combinators refer
/// to tasks they started earlier. An instance can be driven exactly once: by one thread, or by
/// awaiting it inline.
#[derive(Clone)]
pub struct Task {
    cell: Rc<TaskCell>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.cell.id)
            .field("label", &self.cell.label)
            .field("state", &self.cell.state.get())
            .finish()
    }
}

impl Task {
    /// Wrap `body` as a named computation.
    pub fn new(
        label: impl Into<Cow<'static, str>>,
        body: impl Future<Output = ReelResult<()>> + 'static,
    ) -> Self {
        Self {
            cell: Rc::new(TaskCell {
                id: TaskId::fresh(),
                label: label.into(),
                future: RefCell::new(Some(Box::pin(body))),
                claimed: Cell::new(false),
                state: Cell::new(TaskState::Pending),
                cancel_requested: Cell::new(false),
                settled_at: Cell::new(None),
                owner: RefCell::new(None),
            }),
        }
    }

    /// A computation that returns immediately.
    pub fn noop() -> Self {
        Self::new("noop", async { Ok(()) })
    }

    pub fn id(&self) -> TaskId {
        self.cell.id
    }

    pub fn label(&self) -> &str {
        &self.cell.label
    }

    /// Label and id, as reported in diagnostics.
    pub fn identity(&self) -> String {
        format!("{} ({})", self.cell.label, self.cell.id)
    }

    pub fn state(&self) -> TaskState {
        self.cell.state.get()
    }

    /// `true` once the task finished or was canceled.
    pub fn is_settled(&self) -> bool {
        matches!(self.state(), TaskState::Finished | TaskState::Canceled)
    }

    /// Logical time of the driving thread when the task settled.
    pub fn settled_time(&self) -> Option<f64> {
        self.cell.settled_at.get()
    }

    /// Thread driving this task, if it was handed to one.
    pub fn thread(&self) -> Option<ThreadId> {
        self.cell.owner.borrow().as_ref().map(|(_, id)| *id)
    }

    /// `true` if two handles refer to the same instance.
    pub fn ptr_eq(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Force the computation to return at its next resumption.
    ///
    /// When the task runs in its own thread, that thread and all of its children are canceled
    /// immediately.
    pub fn cancel(&self) {
        if self.is_settled() {
            return;
        }
        self.cell.cancel_requested.set(true);

        let owner = self.cell.owner.borrow().clone();
        if let Some((arena, id)) = owner
            && let Some(arena) = arena.upgrade()
        {
            // Busy only while the scheduler itself is mid-bookkeeping; the flag set above is
            // then picked up at the next resumption.
            let garbage = match arena.try_borrow_mut() {
                Ok(mut arena) => arena.cancel(id),
                Err(_) => Vec::new(),
            };
            drop(garbage);
            return;
        }

        if self.state() == TaskState::Pending {
            let body = self.cell.future.borrow_mut().take();
            self.cell.state.set(TaskState::Canceled);
            drop(body);
        }
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cell.cancel_requested.get()
    }

    /// Mark this instance as driven. Fails if something already drives it.
    pub(crate) fn claim(&self) -> ReelResult<()> {
        if self.cell.claimed.replace(true) {
            return Err(ReelError::Reuse {
                task: self.cell.label.to_string(),
                id: self.cell.id.get(),
            });
        }
        if self.state() == TaskState::Pending {
            self.cell.state.set(TaskState::Running);
        }
        Ok(())
    }

    pub(crate) fn bind(&self, arena: Weak<RefCell<ThreadArena>>, id: ThreadId) {
        *self.cell.owner.borrow_mut() = Some((arena, id));
    }

    pub(crate) fn take_future(&self) -> Option<TaskFuture> {
        self.cell.future.borrow_mut().take()
    }

    pub(crate) fn restore_future(&self, body: TaskFuture) {
        *self.cell.future.borrow_mut() = Some(body);
    }

    /// Record the final state. The first call wins.
    pub(crate) fn settle(&self, state: TaskState, time: Option<f64>) -> Option<TaskFuture> {
        if self.is_settled() {
            return None;
        }
        self.cell.state.set(state);
        self.cell.settled_at.set(time);
        self.cell.future.borrow_mut().take()
    }
}

impl IntoFuture for Task {
    type Output = ReelResult<()>;
    type IntoFuture = Inline;

    fn into_future(self) -> Self::IntoFuture {
        Inline {
            task: self,
            body: None,
            started: false,
        }
    }
}

/// Drives a task inside the awaiting computation, without a thread of its own.
pub struct Inline {
    task: Task,
    body: Option<TaskFuture>,
    started: bool,
}

impl Future for Inline {
    type Output = ReelResult<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if !this.started {
            this.started = true;
            if this.task.state() == TaskState::Canceled {
                return Poll::Ready(Ok(()));
            }
            if let Err(e) = this.task.claim() {
                tracing::error!(task = %this.task.identity(), "task awaited after it was already started");
                return Poll::Ready(Err(e));
            }
            this.body = this.task.take_future();
        }

        if this.task.cancel_requested() {
            this.body = None;
            this.task.settle(TaskState::Canceled, context::current_time());
            return Poll::Ready(Ok(()));
        }

        let Some(body) = this.body.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        match body.as_mut().poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(result) => {
                this.body = None;
                this.task.settle(TaskState::Finished, context::current_time());
                Poll::Ready(result)
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/thread/task.rs"]
mod tests;
