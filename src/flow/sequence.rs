use crate::flow::join::join;
use crate::flow::wait::wait_for;
use crate::thread::context::fork;
use crate::thread::task::Task;

/// Start `tasks` one by one, `delay` seconds apart, and wait until all of them finished.
///
/// There is no trailing delay after the last task starts.
pub fn sequence(delay: f64, tasks: impl IntoIterator<Item = Task>) -> Task {
    let tasks: Vec<Task> = tasks.into_iter().collect();
    Task::new("sequence", async move {
        let last = tasks.len().saturating_sub(1);
        for (i, task) in tasks.iter().enumerate() {
            fork(task.clone()).await?;
            if i < last {
                wait_for(delay).await?;
            }
        }
        join(tasks).await
    })
}

#[cfg(test)]
#[path = "../../tests/unit/flow/sequence.rs"]
mod tests;
