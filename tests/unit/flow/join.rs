use super::*;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::flow::wait::wait_for;
use crate::foundation::core::Fps;
use crate::thread::scheduler::Scheduler;

fn scheduler() -> Scheduler {
    Scheduler::new(Fps::new(4, 1).unwrap())
}

fn timed(seen: Rc<RefCell<Option<f64>>>, body: Task) -> Task {
    Task::new("timed", async move {
        body.await?;
        *seen.borrow_mut() = Some(current_thread()?.time());
        Ok(())
    })
}

fn ticker(count: Rc<Cell<u32>>) -> Task {
    Task::new("ticker", async move {
        loop {
            count.set(count.get() + 1);
            next_frame().await?;
        }
    })
}

#[test]
fn all_resumes_after_the_slowest_task() {
    let seen = Rc::new(RefCell::new(None));
    let fast = wait_for(0.5);
    let slow = wait_for(1.0);
    let mut scheduler = scheduler();
    scheduler.start(timed(seen.clone(), all([fast.clone(), slow.clone()])));

    while scheduler.step().unwrap() {}
    assert_eq!(fast.settled_time(), Some(0.5));
    assert_eq!(slow.settled_time(), Some(1.0));
    assert_eq!(*seen.borrow(), Some(1.0));
}

#[test]
fn any_resumes_at_the_first_settlement_and_detaches_the_rest() {
    let seen = Rc::new(RefCell::new(None));
    let ticks = Rc::new(Cell::new(0));
    let loser = ticker(ticks.clone());
    let mut scheduler = scheduler();
    let root = scheduler.start(timed(
        seen.clone(),
        any([wait_for(0.25), loser.clone()]),
    ));

    scheduler.step().unwrap();
    assert_eq!(*seen.borrow(), Some(0.25));
    assert!(root.is_finished());

    let before = ticks.get();
    assert!(scheduler.step().unwrap());
    assert_eq!(ticks.get(), before + 1);
    assert!(!loser.is_settled());
    assert_eq!(scheduler.live_threads(), 1);
}

#[test]
fn join_ignores_tasks_that_never_started() {
    let never = Task::noop();
    let mut scheduler = scheduler();
    let thread = scheduler.start(join(vec![never.clone()]));
    assert!(!scheduler.step().unwrap());
    assert!(thread.is_finished());
    assert_eq!(never.state(), crate::thread::task::TaskState::Pending);
}

#[test]
fn join_waits_for_previously_forked_tasks() {
    let seen = Rc::new(RefCell::new(None));
    let child = wait_for(0.75);
    let body = {
        let child = child.clone();
        Task::new("body", async move {
            fork(child.clone()).await?;
            join(vec![child]).await
        })
    };
    let mut scheduler = scheduler();
    scheduler.start(timed(seen.clone(), body));
    while scheduler.step().unwrap() {}
    assert_eq!(child.settled_time(), Some(0.75));
    assert_eq!(*seen.borrow(), Some(0.75));
}

#[test]
fn canceling_all_cancels_its_children() {
    let ticks = Rc::new(Cell::new(0));
    let a = ticker(ticks.clone());
    let b = ticker(ticks.clone());
    let group = all([a.clone(), b.clone()]);
    let mut scheduler = scheduler();
    scheduler.start(group.clone());
    scheduler.step().unwrap();
    assert_eq!(ticks.get(), 2);

    group.cancel();
    assert_eq!(a.state(), crate::thread::task::TaskState::Canceled);
    assert_eq!(b.state(), crate::thread::task::TaskState::Canceled);
    assert!(!scheduler.step().unwrap());
    assert_eq!(ticks.get(), 2);
}
