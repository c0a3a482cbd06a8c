use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::foundation::error::{ReelError, ReelResult};
use crate::foundation::ids::SignalId;
use crate::signal::stack::{EvalScope, ReactiveNode, untracked, with_stack};

/// Values a [`Signal`] can hold.
///
/// `Default` supplies the fallback when a computed signal fails before it ever cached a value.
pub trait SignalValue: Clone + PartialEq + Default + 'static {}

impl<T: Clone + PartialEq + Default + 'static> SignalValue for T {}

type Evaluator<T> = Rc<dyn Fn() -> ReelResult<T>>;

/// Raw source of a signal: a constant or an evaluator.
pub enum SignalSource<T> {
    /// Plain stored value.
    Constant(T),
    /// Derived value, recomputed when a dependency changes.
    Computed(Evaluator<T>),
}

impl<T: Clone> Clone for SignalSource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Constant(v) => Self::Constant(v.clone()),
            Self::Computed(f) => Self::Computed(f.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for SignalSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

struct SignalInner<T> {
    id: SignalId,
    label: Option<Cow<'static, str>>,
    source: RefCell<SignalSource<T>>,
    last: RefCell<Option<T>>,
    failure: RefCell<Option<ReelError>>,
    dirty: Cell<bool>,
    dependents: RefCell<Vec<(SignalId, Weak<dyn ReactiveNode>)>>,
    dependencies: RefCell<Vec<(SignalId, Weak<dyn ReactiveNode>)>>,
}

impl<T> SignalInner<T> {
    fn display_label(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} ({})", self.id),
            None => self.id.to_string(),
        }
    }

    fn unlink_dependencies(&self) {
        let deps = std::mem::take(&mut *self.dependencies.borrow_mut());
        for (_, dep) in deps {
            if let Some(dep) = dep.upgrade() {
                dep.remove_dependent(self.id);
            }
        }
    }

    fn notify_dependents(&self) {
        let dependents: Vec<_> = {
            let mut list = self.dependents.borrow_mut();
            list.retain(|(_, node)| node.strong_count() > 0);
            list.iter().filter_map(|(_, node)| node.upgrade()).collect()
        };
        for node in dependents {
            node.invalidate();
        }
    }
}

impl<T> ReactiveNode for SignalInner<T> {
    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        self.notify_dependents();
    }

    fn add_dependent(&self, id: SignalId, node: Weak<dyn ReactiveNode>) {
        let mut list = self.dependents.borrow_mut();
        if !list.iter().any(|(existing, _)| *existing == id) {
            list.push((id, node));
        }
    }

    fn remove_dependent(&self, id: SignalId) {
        self.dependents
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }

    fn add_dependency(&self, id: SignalId, node: Weak<dyn ReactiveNode>) {
        let mut list = self.dependencies.borrow_mut();
        if !list.iter().any(|(existing, _)| *existing == id) {
            list.push((id, node));
        }
    }
}

/// Reactive value container with automatic dependency tracking and memoized recomputation.
///
/// Cloning a `Signal` yields another handle to the same node.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("dirty", &self.inner.dirty.get())
            .field("last", &self.inner.last.borrow())
            .finish()
    }
}

impl<T: SignalValue> Signal<T> {
    /// Create a signal from an explicit source.
    pub fn from_source(source: SignalSource<T>) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: SignalId::fresh(),
                label: None,
                source: RefCell::new(source),
                last: RefCell::new(None),
                failure: RefCell::new(None),
                dirty: Cell::new(true),
                dependents: RefCell::new(Vec::new()),
                dependencies: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Create a signal holding `value`.
    pub fn constant(value: T) -> Self {
        Self::from_source(SignalSource::Constant(value))
    }

    /// Create a derived signal. Signals read inside `f` become its dependencies.
    pub fn computed(f: impl Fn() -> T + 'static) -> Self {
        Self::from_source(SignalSource::Computed(Rc::new(move || Ok(f()))))
    }

    /// Create a derived signal whose evaluator may fail.
    ///
    /// A failed evaluation keeps the previously cached value.
    pub fn try_computed(f: impl Fn() -> ReelResult<T> + 'static) -> Self {
        Self::from_source(SignalSource::Computed(Rc::new(f)))
    }

    /// Attach a human-readable label used in diagnostics.
    ///
    /// Labels are fixed at construction time, so this consumes a freshly created signal.
    pub fn with_label(self, label: impl Into<Cow<'static, str>>) -> Self {
        match Rc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                inner.label = Some(label.into());
                Self {
                    inner: Rc::new(inner),
                }
            }
            Err(inner) => {
                tracing::warn!(
                    signal = %inner.display_label(),
                    "with_label ignored: signal is already shared"
                );
                Self { inner }
            }
        }
    }

    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Diagnostic identity: label (if any) and id.
    pub fn label(&self) -> String {
        self.inner.display_label()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_computed(&self) -> bool {
        matches!(&*self.inner.source.borrow(), SignalSource::Computed(_))
    }

    /// Read the value, registering this signal as a dependency of the evaluation in progress.
    ///
    /// Failures degrade to the last cached value (or `T::default()` if nothing was cached yet);
    /// use [`Signal::try_get`] to observe them.
    pub fn get(&self) -> T {
        self.try_get().unwrap_or_else(|_| self.cached())
    }

    /// Read the value, reporting circular dependencies and evaluator failures.
    pub fn try_get(&self) -> ReelResult<T> {
        self.track();
        self.refresh()?;
        Ok(self.cached())
    }

    /// Read without registering a dependency.
    pub fn peek(&self) -> T {
        untracked(|| self.get())
    }

    /// Replace the source with a constant. No-op if the constant is unchanged.
    pub fn set(&self, value: T) {
        {
            let source = self.inner.source.borrow();
            if let SignalSource::Constant(current) = &*source
                && *current == value
            {
                return;
            }
        }
        self.replace_source(SignalSource::Constant(value));
    }

    /// Replace the source with a new evaluator.
    pub fn set_computed(&self, f: impl Fn() -> T + 'static) {
        self.replace_source(SignalSource::Computed(Rc::new(move || Ok(f()))));
    }

    /// Mark dirty so the next read re-evaluates, and notify dependents.
    pub fn reset(&self) {
        self.inner.dirty.set(true);
        self.inner.notify_dependents();
    }

    fn replace_source(&self, source: SignalSource<T>) {
        *self.inner.source.borrow_mut() = source;
        self.inner.unlink_dependencies();
        self.inner.failure.borrow_mut().take();
        self.reset();
    }

    fn cached(&self) -> T {
        self.inner.last.borrow().clone().unwrap_or_default()
    }

    fn track(&self) {
        let Some((reader_id, reader)) = with_stack(|s| s.collector()) else {
            return;
        };
        if reader_id == self.inner.id {
            return;
        }
        self.inner.add_dependent(reader_id, reader.clone());
        if let Some(reader) = reader.upgrade() {
            let me: Weak<dyn ReactiveNode> = Rc::downgrade(&self.inner) as Weak<dyn ReactiveNode>;
            reader.add_dependency(self.inner.id, me);
        }
    }

    fn refresh(&self) -> ReelResult<()> {
        if !self.inner.dirty.get() {
            return match &*self.inner.failure.borrow() {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            };
        }

        let source = self.inner.source.borrow().clone();
        match source {
            SignalSource::Constant(value) => {
                *self.inner.last.borrow_mut() = Some(value);
                self.inner.dirty.set(false);
                Ok(())
            }
            SignalSource::Computed(f) => self.evaluate(f),
        }
    }

    fn evaluate(&self, f: Evaluator<T>) -> ReelResult<()> {
        let id = self.inner.id;
        let label = self.inner.display_label();

        if with_stack(|s| s.contains(id)) {
            let err = ReelError::CircularDependency {
                signal: label.clone(),
            };
            tracing::error!(
                signal = %label,
                "circular dependency between signals; falling back to last cached value"
            );
            with_stack(|s| s.poison_from(id, &err));
            return Err(err);
        }

        self.inner.unlink_dependencies();
        let me: Weak<dyn ReactiveNode> = Rc::downgrade(&self.inner) as Weak<dyn ReactiveNode>;
        let scope = EvalScope::enter(id, label.clone(), Some(me));
        let result = f();
        let recorded = scope.exit();

        let outcome = match (recorded, result) {
            (Err(stack_err), _) => Err(stack_err),
            (Ok(Some(cycle)), _) => Err(cycle),
            (Ok(None), Err(e)) => Err(e),
            (Ok(None), Ok(value)) => {
                *self.inner.last.borrow_mut() = Some(value);
                Ok(())
            }
        };
        self.inner.dirty.set(false);

        match outcome {
            Ok(()) => {
                self.inner.failure.borrow_mut().take();
                Ok(())
            }
            Err(e) => {
                if !matches!(e, ReelError::CircularDependency { .. }) {
                    tracing::warn!(
                        signal = %label,
                        error = %e,
                        "signal evaluation failed; keeping last cached value"
                    );
                }
                *self.inner.failure.borrow_mut() = Some(e.clone());
                Err(e)
            }
        }
    }
}

impl<T: SignalValue> From<T> for Signal<T> {
    fn from(value: T) -> Self {
        Self::constant(value)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/signal/signal.rs"]
mod tests;
