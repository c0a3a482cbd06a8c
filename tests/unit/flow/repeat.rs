use super::*;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::flow::wait::wait_for;
use crate::foundation::core::Fps;
use crate::thread::context::next_frame;
use crate::thread::scheduler::Scheduler;

#[test]
fn counted_loop_passes_iteration_index() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let factory = {
        let seen = seen.clone();
        move |i| {
            seen.borrow_mut().push(i);
            wait_for(0.25)
        }
    };
    let mut scheduler = Scheduler::new(Fps::new(4, 1).unwrap());
    let thread = scheduler.start(repeat(3u64, factory));
    while scheduler.step().unwrap() {}
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    assert!(thread.is_finished());
}

#[test]
fn zero_iterations_return_at_once() {
    let calls = Rc::new(Cell::new(0));
    let factory = {
        let calls = calls.clone();
        move |_| {
            calls.set(calls.get() + 1);
            Task::noop()
        }
    };
    let mut scheduler = Scheduler::new(Fps::new(4, 1).unwrap());
    scheduler.start(repeat(0u64, factory));
    assert!(!scheduler.step().unwrap());
    assert_eq!(calls.get(), 0);
}

#[test]
fn unbounded_loop_runs_until_canceled() {
    let calls = Rc::new(Cell::new(0));
    let factory = {
        let calls = calls.clone();
        move |_| {
            calls.set(calls.get() + 1);
            Task::new("frame", async { next_frame().await })
        }
    };
    let handle = repeat(Iterations::Forever, factory);
    let mut scheduler = Scheduler::new(Fps::new(4, 1).unwrap());
    scheduler.start(handle.clone());
    for _ in 0..5 {
        assert!(scheduler.step().unwrap());
    }
    assert_eq!(calls.get(), 5);

    handle.cancel();
    assert!(!scheduler.step().unwrap());
    assert_eq!(calls.get(), 5);
}

#[test]
fn unbounded_loop_that_never_suspends_stalls() {
    let mut scheduler = Scheduler::with_limits(Fps::new(4, 1).unwrap(), 1_000, 5);
    scheduler.start(repeat(Iterations::Forever, |_| Task::noop()));
    match scheduler.step() {
        Err(ReelError::SchedulingStall { limit, .. }) => assert_eq!(limit, 5),
        other => panic!("expected a stall, got {other:?}"),
    }
}
