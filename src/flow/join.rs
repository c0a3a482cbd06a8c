use crate::foundation::error::ReelResult;
use crate::thread::context::{current_thread, fork, next_frame};
use crate::thread::task::Task;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum JoinMode {
    All,
    First,
}

/// Wait until every task in `tasks` settled.
///
/// Only tasks that were started (forked, spawned, or settled) are tracked. On return, the
/// thread's clock is moved forward to the latest instant at which a joined task settled.
pub fn join(tasks: Vec<Task>) -> Task {
    Task::new("join", join_tasks(tasks, JoinMode::All))
}

/// Start every task in a child thread during this step, then wait for all of them.
pub fn all(tasks: impl IntoIterator<Item = Task>) -> Task {
    let tasks: Vec<Task> = tasks.into_iter().collect();
    Task::new("all", async move {
        for task in &tasks {
            fork(task.clone()).await?;
        }
        join_tasks(tasks, JoinMode::All).await
    })
}

/// Start every task in a child thread during this step, then wait for the first to settle.
///
/// The others are detached from the caller and keep running.
pub fn any(tasks: impl IntoIterator<Item = Task>) -> Task {
    let tasks: Vec<Task> = tasks.into_iter().collect();
    Task::new("any", async move {
        for task in &tasks {
            fork(task.clone()).await?;
        }
        join_tasks(tasks, JoinMode::First).await
    })
}

async fn join_tasks(tasks: Vec<Task>, mode: JoinMode) -> ReelResult<()> {
    let thread = current_thread()?;
    let tracked: Vec<Task> = tasks
        .into_iter()
        .filter(|t| {
            let started = t.thread().is_some() || t.is_settled();
            if !started {
                tracing::debug!(task = %t.identity(), "join ignores a task that was never started");
            }
            started
        })
        .collect();
    if tracked.is_empty() {
        return Ok(());
    }

    let start = thread.time_signal().peek();
    let settled_at = |t: &Task| t.settled_time().unwrap_or(start);

    let child_time = match mode {
        JoinMode::All => {
            while tracked.iter().any(|t| !t.is_settled()) {
                next_frame().await?;
            }
            tracked.iter().map(settled_at).fold(start, f64::max)
        }
        JoinMode::First => {
            while !tracked.iter().any(Task::is_settled) {
                next_frame().await?;
            }
            let mut first = f64::INFINITY;
            for task in &tracked {
                if task.is_settled() {
                    first = first.min(settled_at(task));
                } else {
                    thread.release(task);
                }
            }
            first
        }
    };

    thread.set_time(start.max(child_time));
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/flow/join.rs"]
mod tests;
