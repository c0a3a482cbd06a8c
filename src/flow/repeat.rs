use crate::foundation::error::ReelError;
use crate::thread::context::current_thread;
use crate::thread::task::Task;

/// How many times [`repeat`] runs its factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Iterations {
    Count(u64),
    /// Until canceled.
    Forever,
}

impl From<u64> for Iterations {
    fn from(n: u64) -> Self {
        Self::Count(n)
    }
}

/// Await a factory-produced task `iterations` times. The factory receives the iteration index.
///
/// The returned task is the handle to cancel the loop. An unbounded loop whose iterations keep
/// completing without ever suspending fails with [`ReelError::SchedulingStall`].
pub fn repeat(
    iterations: impl Into<Iterations>,
    mut factory: impl FnMut(u64) -> Task + 'static,
) -> Task {
    let iterations = iterations.into();
    Task::new("repeat", async move {
        let thread = current_thread()?;
        let limit = thread.loop_stall_limit();
        let mut idle = 0usize;
        let mut i = 0u64;

        loop {
            if let Iterations::Count(n) = iterations
                && i >= n
            {
                return Ok(());
            }

            let before = thread.suspensions();
            factory(i).await?;
            i += 1;

            if thread.suspensions() != before {
                idle = 0;
                continue;
            }
            idle += 1;
            if iterations == Iterations::Forever && idle >= limit {
                tracing::error!(
                    thread = %thread.task().identity(),
                    limit,
                    "unbounded loop body never suspends"
                );
                return Err(ReelError::SchedulingStall {
                    thread: thread.task().identity(),
                    limit,
                });
            }
        }
    })
}

#[cfg(test)]
#[path = "../../tests/unit/flow/repeat.rs"]
mod tests;
