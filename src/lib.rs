//! Reel is a reactive playback core for frame-exact, seekable animation.
//!
//! - [`Signal`]s hold values or derive them from other signals, recomputing lazily
//! - [`Task`]s are suspendable computations, stepped one frame at a time by a [`Scheduler`]
//! - Flow combinators ([`all`], [`any`], [`chain`], [`sequence`], [`repeat`], [`wait_for`]) compose
//!   tasks
//! - A [`Player`] drives the scenes of a [`Project`] to any frame and streams rendered frames into
//!   an [`Exporter`]
#![forbid(unsafe_code)]

pub mod animation;
pub mod encode;
pub mod flow;
pub mod foundation;
pub mod playback;
pub mod signal;
pub mod thread;

pub use crate::animation::ease::Ease;
pub use crate::animation::lerp::{InterpFn, Lerp};
pub use crate::foundation::core::{Fps, FrameIndex, FrameRange, Point, Rgba8, Vec2};
pub use crate::foundation::error::{ReelError, ReelResult};
pub use crate::foundation::ids::{SignalId, TaskId, ThreadId};

pub use crate::signal::signal::{Signal, SignalSource, SignalValue};
pub use crate::signal::stack::{dependency_depth, untracked};

pub use crate::thread::context::{current_thread, fork, next_frame, spawn};
pub use crate::thread::scheduler::Scheduler;
pub use crate::thread::task::{Task, TaskState};
pub use crate::thread::thread::{Step, Thread};

pub use crate::flow::chain::chain;
pub use crate::flow::join::{all, any, join};
pub use crate::flow::repeat::{Iterations, repeat};
pub use crate::flow::sequence::sequence;
pub use crate::flow::wait::{TIME_EPSILON, delay, wait_for, wait_until};

pub use crate::encode::exporter::{ExportConfig, Exporter, InMemoryExporter};
pub use crate::encode::ndjson::{NdjsonExporter, NdjsonExporterOpts};
pub use crate::playback::player::{Player, Project};
pub use crate::playback::render::{Drawable, RenderCx, RenderStats, RenderedFrame, SceneFrame};
pub use crate::playback::scene::{SceneCx, ScenePhase, SceneState};
pub use crate::playback::settings::PlayerSettings;
pub use crate::playback::split::{Segment, render_split};
