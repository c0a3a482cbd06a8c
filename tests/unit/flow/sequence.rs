use super::*;

use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::core::Fps;
use crate::thread::context::current_thread;
use crate::thread::scheduler::Scheduler;

fn recorder(starts: Rc<RefCell<Vec<f64>>>) -> Task {
    Task::new("step", async move {
        starts.borrow_mut().push(current_thread()?.time());
        wait_for(0.25).await
    })
}

#[test]
fn starts_tasks_delay_apart_and_waits_for_all() {
    let starts = Rc::new(RefCell::new(Vec::new()));
    let tasks: Vec<Task> = (0..3).map(|_| recorder(starts.clone())).collect();
    let mut scheduler = Scheduler::new(Fps::new(4, 1).unwrap());
    let thread = scheduler.start(sequence(0.5, tasks.clone()));

    while scheduler.step().unwrap() {}
    assert_eq!(*starts.borrow(), vec![0.0, 0.5, 1.0]);
    assert!(thread.is_finished());
    assert!(tasks.iter().all(Task::is_settled));
}

#[test]
fn single_task_has_no_trailing_delay() {
    let starts = Rc::new(RefCell::new(Vec::new()));
    let mut scheduler = Scheduler::new(Fps::new(4, 1).unwrap());
    scheduler.start(sequence(10.0, [recorder(starts.clone())]));
    assert!(!scheduler.step().unwrap());
    assert_eq!(*starts.borrow(), vec![0.0]);
}

#[test]
fn empty_sequence_finishes_immediately() {
    let mut scheduler = Scheduler::new(Fps::new(4, 1).unwrap());
    scheduler.start(sequence(1.0, Vec::new()));
    assert!(!scheduler.step().unwrap());
}
