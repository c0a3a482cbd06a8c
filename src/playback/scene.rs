use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::animation::ease::Ease;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::ReelResult;
use crate::playback::render::{Drawable, RenderCx, SceneFrame};
use crate::playback::settings::PlayerSettings;
use crate::signal::signal::{Signal, SignalValue};
use crate::thread::scheduler::Scheduler;
use crate::thread::task::Task;

/// Fine-grained lifecycle of a scene between two resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScenePhase {
    /// A transition-in is running; the previous scene is still visible.
    Initial,
    AfterTransitionIn,
    /// The scene called [`SceneCx::finish`]; the next scene may start.
    CanTransitionOut,
    /// The root computation and every thread it started returned.
    Finished,
}

/// Coarse scene state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneState {
    Running,
    TransitioningOut,
    Finished,
}

impl ScenePhase {
    pub fn state(self) -> SceneState {
        match self {
            Self::Initial | Self::AfterTransitionIn => SceneState::Running,
            Self::CanTransitionOut => SceneState::TransitioningOut,
            Self::Finished => SceneState::Finished,
        }
    }
}

/// Builds the root task of a scene. Called again on every reset.
pub type SceneFactory = Rc<dyn Fn(&SceneCx) -> Task>;

struct SceneShared {
    name: Rc<str>,
    phase: Cell<ScenePhase>,
    drawables: RefCell<Vec<Rc<dyn Drawable>>>,
    progress: Signal<f64>,
    settings: Rc<PlayerSettings>,
}

/// Handle given to a scene factory, and usable from inside the scene's tasks.
#[derive(Clone)]
pub struct SceneCx {
    shared: Rc<SceneShared>,
}

impl SceneCx {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn phase(&self) -> ScenePhase {
        self.shared.phase.get()
    }

    /// Register a component rendered every frame while this scene is visible.
    pub fn add_drawable(&self, drawable: impl Drawable + 'static) {
        self.shared.drawables.borrow_mut().push(Rc::new(drawable));
    }

    /// Register a closure as a drawable.
    pub fn add(&self, render: impl Fn(&mut RenderCx<'_>) -> ReelResult<()> + 'static) {
        self.add_drawable(render);
    }

    /// Signal seeded from the project variable `name`, or `default` when it is missing or does
    /// not deserialize as `T`.
    pub fn variable<T>(&self, name: &str, default: T) -> Signal<T>
    where
        T: SignalValue + serde::de::DeserializeOwned,
    {
        let value = match self.shared.settings.variables.get(name) {
            Some(raw) => match serde_json::from_value::<T>(raw.clone()) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        scene = %self.shared.name,
                        variable = name,
                        error = %e,
                        "project variable has the wrong type; using default"
                    );
                    default
                }
            },
            None => default,
        };
        Signal::constant(value).with_label(format!("{}::{name}", self.shared.name))
    }

    /// Allow the next scene to start. This scene keeps running until it returns.
    pub fn finish(&self) {
        let phase = self.shared.phase.get();
        if matches!(phase, ScenePhase::Initial | ScenePhase::AfterTransitionIn) {
            self.shared.phase.set(ScenePhase::CanTransitionOut);
        }
    }

    /// Task that drives [`SceneCx::transition_progress`] from 0 to 1 over `seconds`, keeping the
    /// previous scene visible until it completes.
    pub fn transition_in(&self, seconds: f64) -> Task {
        let shared = self.shared.clone();
        Task::new("transition_in", async move {
            if shared.phase.get() == ScenePhase::AfterTransitionIn {
                shared.phase.set(ScenePhase::Initial);
            }
            shared.progress.set(0.0);
            shared.progress.tween(1.0, seconds, Ease::Linear).await?;
            if shared.phase.get() == ScenePhase::Initial {
                shared.phase.set(ScenePhase::AfterTransitionIn);
            }
            Ok(())
        })
    }

    /// Progress of the running transition-in; 1 when none runs.
    pub fn transition_progress(&self) -> Signal<f64> {
        self.shared.progress.clone()
    }
}

/// Frame bounds learned while playing or dry-running a scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SceneCache {
    pub(crate) first_frame: u64,
    /// Frame at which the scene allowed the next one to start.
    pub(crate) last_frame: Option<u64>,
    /// Frames from `first_frame` until the transition-in completed.
    pub(crate) transition_frames: Option<u64>,
    /// The scene was entered while the previous one was still visible.
    pub(crate) entered_in_transition: bool,
}

/// Runtime of one scene: its scheduler plus the state its factory set up.
pub(crate) struct Scene {
    name: Rc<str>,
    factory: SceneFactory,
    settings: Rc<PlayerSettings>,
    scheduler: Option<Scheduler>,
    shared: Option<Rc<SceneShared>>,
    pub(crate) cache: SceneCache,
}

impl Scene {
    pub(crate) fn new(name: Rc<str>, factory: SceneFactory, settings: Rc<PlayerSettings>) -> Self {
        Self {
            name,
            factory,
            settings,
            scheduler: None,
            shared: None,
            cache: SceneCache::default(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Discard all runtime state, rebuild the root task, and run its first step at `first_frame`.
    pub(crate) fn reset(&mut self, first_frame: u64) -> ReelResult<()> {
        if let Some(mut old) = self.scheduler.take() {
            old.cancel_all();
        }
        self.release_shared();

        let shared = Rc::new(SceneShared {
            name: self.name.clone(),
            phase: Cell::new(ScenePhase::AfterTransitionIn),
            drawables: RefCell::new(Vec::new()),
            progress: Signal::constant(1.0).with_label(format!("{}::transition", self.name)),
            settings: self.settings.clone(),
        });
        let cx = SceneCx {
            shared: shared.clone(),
        };

        let mut scheduler = Scheduler::with_limits(
            self.settings.fps,
            self.settings.stall_limit,
            self.settings.loop_stall_limit,
        );
        let root = (self.factory)(&cx);
        scheduler.start(root);

        self.scheduler = Some(scheduler);
        self.shared = Some(shared);
        self.cache.first_frame = first_frame;
        tracing::debug!(scene = %self.name, first_frame, "scene reset");
        self.next()
    }

    // Drawables may capture the `SceneCx` that owns them.
    fn release_shared(&mut self) {
        if let Some(old) = self.shared.take() {
            old.drawables.borrow_mut().clear();
        }
    }

    /// Run one scheduler step.
    pub(crate) fn next(&mut self) -> ReelResult<()> {
        let Some(shared) = self.shared.as_ref() else {
            return Ok(());
        };
        if shared.phase.get() == ScenePhase::Finished {
            return Ok(());
        }
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Ok(());
        };
        scheduler.step()?;
        if scheduler.is_finished() {
            shared.phase.set(ScenePhase::Finished);
            tracing::debug!(scene = %self.name, "scene finished");
        }
        Ok(())
    }

    pub(crate) fn phase(&self) -> ScenePhase {
        self.shared
            .as_ref()
            .map_or(ScenePhase::Finished, |s| s.phase.get())
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.phase() == ScenePhase::Finished
    }

    pub(crate) fn is_after_transition_in(&self) -> bool {
        self.phase() == ScenePhase::AfterTransitionIn
    }

    pub(crate) fn can_transition_out(&self) -> bool {
        matches!(
            self.phase(),
            ScenePhase::CanTransitionOut | ScenePhase::Finished
        )
    }

    /// Render every drawable into a fresh property snapshot.
    pub(crate) fn render(&self, frame: FrameIndex, time_secs: f64) -> ReelResult<SceneFrame> {
        let mut props = serde_json::Map::new();
        if let Some(shared) = self.shared.as_ref() {
            let drawables: Vec<Rc<dyn Drawable>> = shared.drawables.borrow().clone();
            let mut cx = RenderCx::new(&self.name, frame, time_secs, &mut props);
            for drawable in drawables {
                drawable.render(&mut cx)?;
            }
        }
        Ok(SceneFrame {
            name: self.name.to_string(),
            props,
        })
    }
}

impl Drop for Scene {
    fn drop(&mut self) {
        if let Some(mut scheduler) = self.scheduler.take() {
            scheduler.cancel_all();
        }
        self.release_shared();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/scene.rs"]
mod tests;
