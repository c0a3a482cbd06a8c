use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::core::Fps;
use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::ThreadId;
use crate::thread::arena::{ArenaLimits, ThreadArena};
use crate::thread::task::Task;
use crate::thread::thread::{Step, Thread};

/// Default maximum number of thread resumptions inside one [`Scheduler::step`].
pub const DEFAULT_STALL_LIMIT: usize = 100_000;
/// Default number of consecutive non-suspending iterations of an unbounded loop.
pub const DEFAULT_LOOP_STALL_LIMIT: usize = 10_000;

/// Steps a tree of threads in lock-step with the render loop.
///
/// One call to [`Scheduler::step`] is one frame. Within a step, threads are resumed in order;
/// a thread that forks a task has the new child run before it resumes, and tasks handed to
/// `spawn` start later in the same step.
pub struct Scheduler {
    arena: Rc<RefCell<ThreadArena>>,
    active: Vec<ThreadId>,
    stall_limit: usize,
    frames: u64,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("active", &self.active)
            .field("stall_limit", &self.stall_limit)
            .field("frames", &self.frames)
            .finish()
    }
}

impl Scheduler {
    pub fn new(fps: Fps) -> Self {
        Self::with_limits(fps, DEFAULT_STALL_LIMIT, DEFAULT_LOOP_STALL_LIMIT)
    }

    pub fn with_limits(fps: Fps, stall_limit: usize, loop_stall_limit: usize) -> Self {
        Self {
            arena: Rc::new(RefCell::new(ThreadArena::new(ArenaLimits {
                frame_step: fps.frame_duration_secs(),
                loop_stall_limit,
            }))),
            active: Vec::new(),
            stall_limit: stall_limit.max(1),
            frames: 0,
        }
    }

    /// Start `task` as a root thread.
    ///
    /// A task that is already driven elsewhere is logged and yields an inert thread.
    pub fn start(&mut self, task: Task) -> Thread {
        let (thread, _) = Thread::create_in(&self.arena, task);
        self.active.push(thread.id());
        thread
    }

    /// Like [`Scheduler::start`] but reports reuse as [`ReelError::Reuse`].
    pub fn try_start(&mut self, task: Task) -> ReelResult<Thread> {
        let (thread, err) = Thread::create_in(&self.arena, task);
        self.active.push(thread.id());
        match err {
            Some(e) => Err(e),
            None => Ok(thread),
        }
    }

    /// Duration of one step in seconds.
    pub fn frame_step(&self) -> f64 {
        self.arena.borrow().limits.frame_step
    }

    /// Number of completed steps.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Number of threads not yet settled.
    pub fn live_threads(&self) -> usize {
        self.arena.borrow().live_count()
    }

    /// `true` once every thread returned or was canceled.
    pub fn is_finished(&self) -> bool {
        self.active.is_empty()
    }

    /// Cancel every thread.
    pub fn cancel_all(&mut self) {
        for id in std::mem::take(&mut self.active) {
            let garbage = self.arena.borrow_mut().cancel(id);
            drop(garbage);
        }
    }

    /// Run one frame. Returns `true` while threads remain.
    ///
    /// An error returned by a computation aborts the step and is propagated; the failing thread
    /// is settled, the others stay as they are.
    pub fn step(&mut self) -> ReelResult<bool> {
        let dt = self.frame_step();
        let mut queue: Vec<ThreadId> = self.active.drain(..).rev().collect();
        let mut survivors: Vec<ThreadId> = Vec::new();
        let mut resumptions = 0usize;

        while let Some(id) = queue.pop() {
            let Some(thread) = Thread::from_arena(self.arena.clone(), id) else {
                continue;
            };
            if thread.is_canceled() {
                continue;
            }

            resumptions += 1;
            if resumptions > self.stall_limit {
                tracing::error!(
                    thread = %thread.task().identity(),
                    limit = self.stall_limit,
                    "scheduler step never settled"
                );
                survivors.push(id);
                survivors.extend(queue.iter().rev());
                self.active = survivors;
                return Err(ReelError::SchedulingStall {
                    thread: thread.task().identity(),
                    limit: self.stall_limit,
                });
            }

            let step = match thread.next() {
                Ok(step) => step,
                Err(e) => {
                    survivors.extend(queue.iter().rev());
                    self.active = survivors;
                    return Err(e);
                }
            };

            match step {
                Step::Done => {}
                Step::Paused => survivors.push(id),
                Step::Fork(task) => {
                    queue.push(id);
                    let spawned = self.adopt_spawned(&thread)?;
                    queue.extend(spawned.iter().rev());
                    let child = thread.adopt(task)?;
                    queue.push(child.id());
                }
                Step::Frame => {
                    let spawned = self.adopt_spawned(&thread)?;
                    queue.extend(spawned.iter().rev());
                    thread.update(dt);
                    survivors.push(id);
                }
            }
        }

        {
            let arena = self.arena.borrow();
            survivors.retain(|id| !arena.is_canceled(*id));
            survivors.sort_by_key(|id| depth(&arena, *id));
        }
        self.active = survivors;
        self.frames += 1;
        Ok(!self.active.is_empty())
    }

    fn adopt_spawned(&self, thread: &Thread) -> ReelResult<Vec<ThreadId>> {
        thread
            .drain()
            .into_iter()
            .map(|task| thread.adopt(task).map(|child| child.id()))
            .collect()
    }
}

fn depth(arena: &ThreadArena, id: ThreadId) -> usize {
    let mut depth = 0;
    let mut cursor = arena.get(id).and_then(|r| r.parent);
    while let Some(parent) = cursor {
        depth += 1;
        cursor = arena.get(parent).and_then(|r| r.parent);
    }
    depth
}

#[cfg(test)]
#[path = "../../tests/unit/thread/scheduler.rs"]
mod tests;
