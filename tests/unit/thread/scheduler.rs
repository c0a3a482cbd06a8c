use super::*;

use crate::thread::context::{current_thread, fork, next_frame, spawn};
use crate::thread::task::TaskState;

type Log = Rc<RefCell<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

fn fps(n: u32) -> Fps {
    Fps::new(n, 1).unwrap()
}

#[test]
fn forked_child_runs_before_parent_resumes() {
    let log: Log = Rc::default();
    let child = {
        let log = log.clone();
        Task::new("child", async move {
            push(&log, "child");
            next_frame().await?;
            push(&log, "child again");
            Ok(())
        })
    };
    let parent = {
        let log = log.clone();
        Task::new("parent", async move {
            push(&log, "parent");
            fork(child).await?;
            push(&log, "parent resumed");
            loop {
                next_frame().await?;
            }
        })
    };

    let mut scheduler = Scheduler::new(fps(4));
    scheduler.start(parent);
    assert!(scheduler.step().unwrap());
    assert_eq!(*log.borrow(), vec!["parent", "child", "parent resumed"]);

    scheduler.step().unwrap();
    assert_eq!(log.borrow().last().map(String::as_str), Some("child again"));
    assert_eq!(scheduler.live_threads(), 1);
}

#[test]
fn spawned_tasks_start_in_the_same_step_at_the_parent_time() {
    let log: Log = Rc::default();
    let seen_time = Rc::new(RefCell::new(None));
    let spawned = {
        let log = log.clone();
        let seen_time = seen_time.clone();
        Task::new("spawned", async move {
            push(&log, "spawned");
            *seen_time.borrow_mut() = Some(current_thread()?.time());
            Ok(())
        })
    };
    let parent = {
        let log = log.clone();
        Task::new("parent", async move {
            next_frame().await?;
            spawn(spawned)?;
            push(&log, "parent");
            next_frame().await
        })
    };

    let mut scheduler = Scheduler::new(fps(4));
    scheduler.start(parent);
    scheduler.step().unwrap();
    assert!(log.borrow().is_empty());

    scheduler.step().unwrap();
    assert_eq!(*log.borrow(), vec!["parent", "spawned"]);
    assert_eq!(*seen_time.borrow(), Some(0.25));
}

#[test]
fn clocks_advance_one_frame_step_per_step() {
    let mut scheduler = Scheduler::new(fps(4));
    let thread = scheduler.start(Task::new("ticker", async {
        loop {
            next_frame().await?;
        }
    }));
    for _ in 0..3 {
        scheduler.step().unwrap();
    }
    assert_eq!(scheduler.frames(), 3);
    assert_eq!(thread.time(), 0.75);
    assert_eq!(scheduler.frame_step(), 0.25);
}

#[test]
fn finishes_when_every_thread_returned() {
    let mut scheduler = Scheduler::new(fps(4));
    let thread = scheduler.start(Task::new("short", async { next_frame().await }));
    assert!(scheduler.step().unwrap());
    assert!(!scheduler.step().unwrap());
    assert!(scheduler.is_finished());
    assert!(thread.is_finished());
    assert_eq!(scheduler.live_threads(), 0);
}

#[test]
fn canceled_root_task_leaves_no_thread_behind() {
    let mut scheduler = Scheduler::new(fps(4));
    let task = Task::new("never", async {
        loop {
            next_frame().await?;
        }
    });
    task.cancel();
    scheduler.start(task.clone());

    assert!(!scheduler.step().unwrap());
    assert_eq!(scheduler.live_threads(), 0);
    assert_eq!(task.state(), TaskState::Canceled);
}

#[test]
fn endless_forking_is_a_scheduling_stall() {
    let mut scheduler = Scheduler::with_limits(fps(4), 4, 10);
    scheduler.start(Task::new("forker", async {
        loop {
            fork(Task::noop()).await?;
        }
    }));
    let err = scheduler.step().unwrap_err();
    match err {
        ReelError::SchedulingStall { thread, limit } => {
            assert!(thread.starts_with("forker"));
            assert_eq!(limit, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn computation_errors_abort_the_step_but_keep_other_threads() {
    let mut scheduler = Scheduler::new(fps(4));
    scheduler.start(Task::new("failing", async {
        Err(ReelError::evaluation("broken"))
    }));
    let survivor = scheduler.start(Task::new("survivor", async {
        loop {
            next_frame().await?;
        }
    }));

    assert!(matches!(scheduler.step(), Err(ReelError::Evaluation(_))));
    assert!(scheduler.step().unwrap());
    assert_eq!(survivor.time(), 0.25);
}

#[test]
fn paused_threads_hold_their_clock() {
    let mut scheduler = Scheduler::new(fps(4));
    let thread = scheduler.start(Task::new("ticker", async {
        loop {
            next_frame().await?;
        }
    }));
    scheduler.step().unwrap();
    thread.pause(true);
    scheduler.step().unwrap();
    scheduler.step().unwrap();
    assert_eq!(thread.time(), 0.25);
    assert!(!scheduler.is_finished());

    thread.pause(false);
    scheduler.step().unwrap();
    assert_eq!(thread.time(), 0.5);
}

#[test]
fn cancel_all_settles_every_thread() {
    let mut scheduler = Scheduler::new(fps(4));
    let root = scheduler.start(Task::new("root", async {
        spawn(Task::new("child", async {
            loop {
                next_frame().await?;
            }
        }))?;
        loop {
            next_frame().await?;
        }
    }));
    scheduler.step().unwrap();
    assert_eq!(scheduler.live_threads(), 2);

    scheduler.cancel_all();
    assert!(scheduler.is_finished());
    assert!(root.is_canceled());
    assert_eq!(scheduler.live_threads(), 0);
}

#[test]
fn reused_root_task_yields_inert_thread() {
    let mut scheduler = Scheduler::new(fps(4));
    let task = Task::new("once", async {
        loop {
            next_frame().await?;
        }
    });
    scheduler.start(task.clone());
    assert!(matches!(
        scheduler.try_start(task),
        Err(ReelError::Reuse { .. })
    ));
    scheduler.step().unwrap();
    assert_eq!(scheduler.live_threads(), 1);
}
