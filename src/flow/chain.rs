use crate::thread::task::Task;

/// Run `tasks` one after another, each to completion, in order.
pub fn chain(tasks: impl IntoIterator<Item = Task>) -> Task {
    let tasks: Vec<Task> = tasks.into_iter().collect();
    Task::new("chain", async move {
        for task in tasks {
            task.await?;
        }
        Ok(())
    })
}
