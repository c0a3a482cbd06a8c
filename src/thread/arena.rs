use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::ThreadId;
use crate::signal::signal::Signal;
use crate::thread::task::{Task, TaskFuture, TaskState};

/// What a suspended computation asked of the scheduler, besides waiting a frame.
pub(crate) enum Request {
    Fork(Task),
}

pub(crate) struct ThreadRecord {
    pub(crate) task: Task,
    pub(crate) time: Signal<f64>,
    pub(crate) fixed: f64,
    pub(crate) parent: Option<ThreadId>,
    pub(crate) children: Vec<ThreadId>,
    pub(crate) canceled: bool,
    pub(crate) paused: bool,
    /// Wraps a reused task; never runs anything.
    pub(crate) inert: bool,
    /// Tasks handed to `spawn`, started after the current resumption.
    pub(crate) queue: Vec<Task>,
    pub(crate) request: Option<Request>,
    /// Number of times the computation suspended.
    pub(crate) suspensions: u64,
}

struct Slot {
    generation: u32,
    record: Option<ThreadRecord>,
}

/// Limits shared by every thread in one arena.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ArenaLimits {
    pub(crate) frame_step: f64,
    pub(crate) loop_stall_limit: usize,
}

/// Generational arena holding every live thread of one scheduler.
///
/// Parent/child links are ids, never owning references. Settled threads free their slot; stale
/// ids then resolve to `None`.
pub(crate) struct ThreadArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    pub(crate) limits: ArenaLimits,
}

impl ThreadArena {
    pub(crate) fn new(limits: ArenaLimits) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            limits,
        }
    }

    pub(crate) fn get(&self, id: ThreadId) -> Option<&ThreadRecord> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ThreadId) -> Option<&mut ThreadRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.record.as_mut()
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.record.is_some()).count()
    }

    /// Wrap `task` in a new thread.
    ///
    /// A task that is already driven elsewhere yields an inert thread plus the reuse error.
    pub(crate) fn create(
        this: &Rc<RefCell<ThreadArena>>,
        task: Task,
    ) -> (ThreadId, Option<ReelError>) {
        let (task, inert, err) = match task.claim() {
            Ok(()) => (task, false, None),
            Err(e) => {
                tracing::error!(
                    task = %task.identity(),
                    "task is already driven by another thread; the new thread is inert"
                );
                let inert = Task::new(format!("inert {}", task.label()), async { Ok(()) });
                (inert, true, Some(e))
            }
        };

        let record = ThreadRecord {
            task: task.clone(),
            time: Signal::constant(0.0).with_label(format!("time of {}", task.label())),
            fixed: 0.0,
            parent: None,
            children: Vec::new(),
            canceled: false,
            paused: false,
            inert,
            queue: Vec::new(),
            request: None,
            suspensions: 0,
        };

        let id = this.borrow_mut().insert(record);
        if !inert {
            task.bind(Rc::downgrade(this), id);
        }
        (id, err)
    }

    fn insert(&mut self, record: ThreadRecord) -> ThreadId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.record = Some(record);
            return ThreadId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            record: Some(record),
        });
        ThreadId {
            index,
            generation: 0,
        }
    }

    fn release(&mut self, id: ThreadId) -> Option<ThreadRecord> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        let record = slot.record.take()?;
        self.free.push(id.index);
        Some(record)
    }

    /// Canceled flag, inherited from every ancestor. Freed threads count as canceled.
    pub(crate) fn is_canceled(&self, id: ThreadId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(record) = self.get(current) else {
                return true;
            };
            if record.canceled {
                return true;
            }
            cursor = record.parent;
        }
        false
    }

    /// Paused flag, inherited from every ancestor.
    pub(crate) fn is_paused(&self, id: ThreadId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(record) = self.get(current) else {
                return false;
            };
            if record.paused {
                return true;
            }
            cursor = record.parent;
        }
        false
    }

    /// Attach `child` under `parent`, inheriting its clock.
    ///
    /// Pause is not copied: it flows down through [`ThreadArena::is_paused`] for as long as the
    /// child stays attached, and the child keeps its own flag.
    pub(crate) fn add(&mut self, parent: ThreadId, child: ThreadId) -> ReelResult<()> {
        if parent == child {
            return Err(ReelError::validation("a thread cannot be its own child"));
        }
        let Some(p) = self.get(parent) else {
            return Err(ReelError::validation(format!(
                "cannot add a child to settled thread {parent}"
            )));
        };
        let time = p.time.peek();
        let fixed = p.fixed;

        let old_parent = match self.get_mut(child) {
            Some(c) => {
                let old = c.parent.replace(parent);
                c.fixed = fixed;
                c.time.set(time);
                old
            }
            None => {
                return Err(ReelError::validation(format!(
                    "cannot add settled thread {child}"
                )));
            }
        };
        if let Some(old) = old_parent
            && let Some(o) = self.get_mut(old)
        {
            o.children.retain(|c| *c != child);
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        Ok(())
    }

    /// Remove `child` from its parent, so it no longer inherits cancellation or pause.
    pub(crate) fn detach(&mut self, child: ThreadId) {
        let Some(parent) = self.get_mut(child).and_then(|c| c.parent.take()) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
    }

    /// Advance the clock of an unpaused thread and prune settled children.
    pub(crate) fn update(&mut self, id: ThreadId, dt: f64) {
        let paused = self.is_paused(id);
        let children = match self.get_mut(id) {
            Some(record) => {
                if !paused {
                    let now = record.time.peek();
                    record.time.set(now + dt);
                    record.fixed += dt;
                }
                std::mem::take(&mut record.children)
            }
            None => return,
        };
        let alive: Vec<ThreadId> = children
            .into_iter()
            .filter(|c| !self.is_canceled(*c))
            .collect();
        if let Some(record) = self.get_mut(id) {
            record.children = alive;
        }
    }

    /// Cancel `id` and every descendant.
    ///
    /// Returns the bodies that must be dropped; the caller drops them after releasing its borrow
    /// of the arena, since dropping a computation may run user code.
    pub(crate) fn cancel(&mut self, id: ThreadId) -> Vec<TaskFuture> {
        let mut garbage = Vec::new();
        self.settle(id, TaskState::Canceled, &mut garbage);
        garbage
    }

    /// Mark `id` finished after its computation returned; its children are canceled.
    pub(crate) fn finish(&mut self, id: ThreadId) -> Vec<TaskFuture> {
        let mut garbage = Vec::new();
        self.settle(id, TaskState::Finished, &mut garbage);
        garbage
    }

    fn settle(&mut self, id: ThreadId, state: TaskState, garbage: &mut Vec<TaskFuture>) {
        self.detach(id);
        let Some(mut record) = self.release(id) else {
            return;
        };
        record.canceled |= state == TaskState::Canceled;

        let time = record.time.peek();
        if let Some(body) = record.task.settle(state, Some(time)) {
            garbage.push(body);
        }
        for queued in record.queue.drain(..) {
            if let Some(body) = queued.settle(TaskState::Canceled, Some(time)) {
                garbage.push(body);
            }
        }
        if let Some(Request::Fork(pending)) = record.request.take()
            && let Some(body) = pending.settle(TaskState::Canceled, Some(time))
        {
            garbage.push(body);
        }
        for child in std::mem::take(&mut record.children) {
            if let Some(c) = self.get_mut(child) {
                c.parent = None;
            }
            self.settle(child, TaskState::Canceled, garbage);
        }
    }
}
