use crate::animation::ease::Ease;
use crate::animation::lerp::{InterpFn, Lerp};
use crate::flow::wait::TIME_EPSILON;
use crate::signal::signal::{Signal, SignalValue};
use crate::thread::context::{current_thread, next_frame};
use crate::thread::task::Task;

impl<T: SignalValue + Lerp> Signal<T> {
    /// Animate towards `target` over `seconds`, shaped by `ease`.
    pub fn tween(&self, target: T, seconds: f64, ease: Ease) -> Task {
        self.tween_with(target, seconds, ease, T::lerp)
    }
}

impl<T: SignalValue> Signal<T> {
    /// Animate towards `target` with a custom interpolation function.
    ///
    /// The start value is read when the task first runs. Every step sets the interpolated value;
    /// the final step sets `target` itself. A non-positive duration sets `target` immediately.
    pub fn tween_with(&self, target: T, seconds: f64, ease: Ease, interp: InterpFn<T>) -> Task {
        let signal = self.clone();
        Task::new(format!("tween {}", self.label()), async move {
            if seconds <= 0.0 || !seconds.is_finite() {
                signal.set(target);
                return Ok(());
            }

            let from = signal.peek();
            let thread = current_thread()?;
            let start = thread.time_signal().peek();
            let end = start + seconds;

            while end > thread.fixed() + TIME_EPSILON {
                let elapsed = thread.fixed() - start;
                if elapsed > 0.0 {
                    signal.set(interp(&from, &target, ease.apply(elapsed / seconds)));
                }
                next_frame().await?;
            }

            thread.set_time(end);
            signal.set(target);
            Ok(())
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/signal/tween.rs"]
mod tests;
