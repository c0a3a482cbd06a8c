//! Dependency-collection stack used while computed signals evaluate.
//!
//! Every evaluation pushes one [`EvalFrame`] and must pop exactly that frame again. The push and
//! pop are tied to an [`EvalScope`] guard, so an evaluator that panics or returns early still
//! leaves the stack balanced. The stack lives in a thread-local: signals are `!Send`, so every
//! OS thread (including each rayon worker rendering its own segment) collects independently.

use std::cell::RefCell;
use std::rc::Weak;

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::SignalId;

/// Type-erased view of a signal node, as needed by dependency bookkeeping.
pub(crate) trait ReactiveNode {
    /// Mark dirty and propagate to dependents.
    fn invalidate(&self);
    fn add_dependent(&self, id: SignalId, node: Weak<dyn ReactiveNode>);
    fn remove_dependent(&self, id: SignalId);
    fn add_dependency(&self, id: SignalId, node: Weak<dyn ReactiveNode>);
}

/// One evaluation context on the stack.
pub(crate) struct EvalFrame {
    pub(crate) id: SignalId,
    pub(crate) label: String,
    /// `None` for untracked scopes: reads inside them register nothing.
    pub(crate) collector: Option<Weak<dyn ReactiveNode>>,
    /// Set when a cycle was detected while this frame was active.
    pub(crate) failure: Option<ReelError>,
}

/// Ordered stack of evaluation contexts.
#[derive(Default)]
pub struct DependencyStack {
    frames: Vec<EvalFrame>,
}

impl DependencyStack {
    /// Number of evaluation contexts currently open.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push(&mut self, frame: EvalFrame) {
        self.frames.push(frame);
    }

    /// Pop the top frame, which must belong to `expected`.
    ///
    /// An empty stack and a wrong top frame are reported as different errors. On mismatch the
    /// stack is unwound down to (and including) `expected`, if present, so later evaluations start
    /// from a consistent state.
    pub(crate) fn pop(&mut self, expected: SignalId, label: &str) -> ReelResult<EvalFrame> {
        let Some(top) = self.frames.last() else {
            return Err(ReelError::ContextUnderflow);
        };
        if top.id == expected {
            return self.frames.pop().ok_or(ReelError::ContextUnderflow);
        }

        let found = top.label.clone();
        if let Some(pos) = self.frames.iter().rposition(|f| f.id == expected) {
            self.frames.truncate(pos);
        }
        Err(ReelError::ContextMismatch {
            expected: label.to_owned(),
            found,
        })
    }

    pub(crate) fn contains(&self, id: SignalId) -> bool {
        self.frames.iter().any(|f| f.id == id)
    }

    /// Collector of the innermost frame, if that frame tracks reads.
    pub(crate) fn collector(&self) -> Option<(SignalId, Weak<dyn ReactiveNode>)> {
        let top = self.frames.last()?;
        top.collector.as_ref().map(|node| (top.id, node.clone()))
    }

    /// Record `err` on every frame from the one evaluating `id` up to the top.
    ///
    /// Those frames are exactly the members of the cycle that was just closed.
    pub(crate) fn poison_from(&mut self, id: SignalId, err: &ReelError) {
        let Some(pos) = self.frames.iter().rposition(|f| f.id == id) else {
            return;
        };
        for frame in &mut self.frames[pos..] {
            if frame.failure.is_none() {
                frame.failure = Some(err.clone());
            }
        }
    }
}

thread_local! {
    static STACK: RefCell<DependencyStack> = RefCell::new(DependencyStack::default());
}

pub(crate) fn with_stack<R>(f: impl FnOnce(&mut DependencyStack) -> R) -> R {
    STACK.with(|s| f(&mut s.borrow_mut()))
}

/// Current depth of this thread's dependency stack. Zero whenever no evaluation is running.
pub fn dependency_depth() -> usize {
    with_stack(|s| s.depth())
}

/// Guard that owns one pushed frame until [`EvalScope::exit`] or drop.
pub(crate) struct EvalScope {
    id: SignalId,
    label: String,
    open: bool,
}

impl EvalScope {
    pub(crate) fn enter(
        id: SignalId,
        label: String,
        collector: Option<Weak<dyn ReactiveNode>>,
    ) -> Self {
        with_stack(|s| {
            s.push(EvalFrame {
                id,
                label: label.clone(),
                collector,
                failure: None,
            })
        });
        Self {
            id,
            label,
            open: true,
        }
    }

    /// Pop the frame and hand back any failure recorded on it.
    pub(crate) fn exit(mut self) -> ReelResult<Option<ReelError>> {
        self.open = false;
        with_stack(|s| s.pop(self.id, &self.label)).map(|frame| frame.failure)
    }
}

impl Drop for EvalScope {
    fn drop(&mut self) {
        if !self.open {
            return;
        }
        // Unwinding out of an evaluator. `try_with` because the thread-local may already be gone
        // during thread teardown.
        let _ = STACK.try_with(|s| {
            if let Ok(mut s) = s.try_borrow_mut()
                && let Err(e) = s.pop(self.id, &self.label)
            {
                tracing::error!(signal = %self.label, error = %e, "dependency stack unbalanced");
            }
        });
    }
}

/// Run `f` without registering any signal reads as dependencies.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let scope = EvalScope::enter(SignalId::fresh(), "untracked".to_owned(), None);
    let out = f();
    if let Err(e) = scope.exit() {
        tracing::error!(error = %e, "dependency stack unbalanced after untracked scope");
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/signal/stack.rs"]
mod tests;
