/// Convenience result type used across Reel.
pub type ReelResult<T> = Result<T, ReelError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum ReelError {
    /// A computation instance was handed to a second thread.
    #[error("reuse error: task '{task}' (#{id}) is already driven by another thread")]
    Reuse {
        /// Label of the reused task.
        task: String,
        /// Unique id of the reused task.
        id: u64,
    },

    /// A computed signal read itself, directly or through other signals.
    #[error("circular dependency error: signal '{signal}' depends on itself")]
    CircularDependency {
        /// Label of the signal that was re-entered.
        signal: String,
    },

    /// The dependency stack was popped while empty.
    #[error("context underflow: dependency stack popped while empty")]
    ContextUnderflow,

    /// The dependency stack was popped out of order.
    #[error("context mismatch: expected to pop '{expected}' but found '{found}'")]
    ContextMismatch {
        /// Label of the context the caller pushed.
        expected: String,
        /// Label of the context actually on top of the stack.
        found: String,
    },

    /// A scheduler API was used outside a running computation.
    #[error("context unavailable: '{operation}' must be called from inside a running task")]
    ContextUnavailable {
        /// Name of the attempted operation.
        operation: &'static str,
    },

    /// A computation kept running without ever suspending.
    #[error("scheduling stall: '{thread}' exceeded {limit} resumptions without yielding a frame")]
    SchedulingStall {
        /// Label of the offending thread or loop.
        thread: String,
        /// The limit that was exceeded.
        limit: usize,
    },

    /// Invalid user-provided settings or arguments.
    #[error("validation error: {0}")]
    Validation(String),

    /// Errors raised by user computations or evaluators.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Rendering stopped early; `committed` frames were already handed to the exporter.
    #[error("render aborted after {committed} committed frame(s): {source}")]
    PartialRender {
        /// Frames delivered to the exporter before the failure.
        committed: u64,
        /// The failure that stopped the render.
        source: Box<ReelError>,
    },

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReelError {
    /// Build a [`ReelError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReelError::Evaluation`] value.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`ReelError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    pub(crate) fn unavailable(operation: &'static str) -> Self {
        Self::ContextUnavailable { operation }
    }

    /// Number of frames committed before a [`ReelError::PartialRender`], if any.
    pub fn committed_frames(&self) -> Option<u64> {
        match self {
            Self::PartialRender { committed, .. } => Some(*committed),
            _ => None,
        }
    }
}

// Evaluators and signals clone their last failure into diagnostics; `anyhow::Error` is not
// `Clone`, so the wrapped variant is flattened to its message.
impl Clone for ReelError {
    fn clone(&self) -> Self {
        match self {
            Self::Reuse { task, id } => Self::Reuse {
                task: task.clone(),
                id: *id,
            },
            Self::CircularDependency { signal } => Self::CircularDependency {
                signal: signal.clone(),
            },
            Self::ContextUnderflow => Self::ContextUnderflow,
            Self::ContextMismatch { expected, found } => Self::ContextMismatch {
                expected: expected.clone(),
                found: found.clone(),
            },
            Self::ContextUnavailable { operation } => Self::ContextUnavailable { operation },
            Self::SchedulingStall { thread, limit } => Self::SchedulingStall {
                thread: thread.clone(),
                limit: *limit,
            },
            Self::Validation(m) => Self::Validation(m.clone()),
            Self::Evaluation(m) => Self::Evaluation(m.clone()),
            Self::Serde(m) => Self::Serde(m.clone()),
            Self::PartialRender { committed, source } => Self::PartialRender {
                committed: *committed,
                source: source.clone(),
            },
            Self::Other(e) => Self::Other(anyhow::anyhow!("{e:#}")),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
