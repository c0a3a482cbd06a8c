use crate::thread::context::{current_thread, next_frame};
use crate::thread::task::Task;

/// Tolerance used when comparing accumulated frame time against a target instant.
pub const TIME_EPSILON: f64 = 1e-9;

/// Wait `seconds` of logical time.
///
/// Suspends until the thread's accumulated frame time is within one frame step of the target,
/// then moves the thread's clock exactly onto the target instant. Successive waits therefore do
/// not accumulate rounding drift.
pub fn wait_for(seconds: f64) -> Task {
    Task::new("wait_for", async move {
        let thread = current_thread()?;
        let step = thread.frame_step();
        let target = thread.time_signal().peek() + seconds.max(0.0);
        while target - step > thread.fixed() + TIME_EPSILON {
            next_frame().await?;
        }
        thread.set_time(target);
        Ok(())
    })
}

/// Wait `seconds`, then run `task` inline.
pub fn delay(seconds: f64, task: Task) -> Task {
    Task::new("delay", async move {
        wait_for(seconds).await?;
        task.await
    })
}

/// Suspend until `condition` holds. Checked once per step, starting immediately.
pub fn wait_until(condition: impl Fn() -> bool + 'static) -> Task {
    Task::new("wait_until", async move {
        while !condition() {
            next_frame().await?;
        }
        Ok(())
    })
}

#[cfg(test)]
#[path = "../../tests/unit/flow/wait.rs"]
mod tests;
