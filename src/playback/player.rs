use std::rc::Rc;

use crate::encode::exporter::{ExportConfig, Exporter};
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{ReelError, ReelResult};
use crate::playback::render::{RenderStats, RenderedFrame};
use crate::playback::scene::{Scene, SceneCx, SceneFactory, ScenePhase, SceneState};
use crate::playback::settings::PlayerSettings;
use crate::thread::task::Task;

/// Ordered scenes plus the settings they are played with.
#[derive(Clone)]
pub struct Project {
    settings: PlayerSettings,
    scenes: Vec<(Rc<str>, SceneFactory)>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("settings", &self.settings)
            .field("scenes", &self.scene_names())
            .finish()
    }
}

impl Project {
    pub fn new(settings: PlayerSettings) -> Self {
        Self {
            settings,
            scenes: Vec::new(),
        }
    }

    /// Append a scene. `factory` builds the scene's root task and runs again on every reset.
    pub fn scene(
        mut self,
        name: impl Into<String>,
        factory: impl Fn(&SceneCx) -> Task + 'static,
    ) -> Self {
        let name: Rc<str> = Rc::from(name.into());
        let factory: SceneFactory = Rc::new(factory);
        self.scenes.push((name, factory));
        self
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    pub fn scene_names(&self) -> Vec<&str> {
        self.scenes.iter().map(|(name, _)| &**name).collect()
    }
}

/// Playback cursor over a [`Project`].
///
/// The player keeps one active scene, plus the outgoing one while a cross-fade runs. Moving to
/// any frame with [`Player::seek`] reconstructs exactly the state that stepping through every
/// earlier frame would have produced.
pub struct Player {
    settings: Rc<PlayerSettings>,
    scenes: Vec<Scene>,
    current: usize,
    previous: Option<usize>,
    frame: u64,
    finished: bool,
    duration: Option<u64>,
}

impl Player {
    /// Validate the project and position the player at frame 0.
    pub fn new(project: Project) -> ReelResult<Self> {
        project.settings.validate()?;
        if project.scenes.is_empty() {
            return Err(ReelError::validation("project must contain at least one scene"));
        }

        let settings = Rc::new(project.settings);
        let scenes = project
            .scenes
            .into_iter()
            .map(|(name, factory)| Scene::new(name, factory, settings.clone()))
            .collect();

        let mut player = Self {
            duration: settings.duration_frames,
            settings,
            scenes,
            current: 0,
            previous: None,
            frame: 0,
            finished: false,
        };
        player.restart_at(0)?;
        Ok(player)
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Current global frame.
    pub fn frame(&self) -> FrameIndex {
        FrameIndex(self.frame)
    }

    pub fn current_scene(&self) -> &str {
        self.scenes[self.current].name()
    }

    /// Outgoing scene while a cross-fade runs.
    pub fn previous_scene(&self) -> Option<&str> {
        self.previous.map(|i| self.scenes[i].name())
    }

    pub fn scene_phase(&self) -> ScenePhase {
        self.scenes[self.current].phase()
    }

    pub fn scene_state(&self) -> SceneState {
        self.scene_phase().state()
    }

    /// `true` once the last scene finished.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Advance one frame. Returns `false` once playback finished.
    pub fn advance(&mut self) -> ReelResult<bool> {
        self.frame += 1;

        if let Some(prev) = self.previous {
            self.scenes[prev].next()?;
            if self.scenes[prev].is_finished() || self.scenes[self.current].is_finished() {
                self.drop_previous();
            }
        }

        let current = self.current;
        if !self.scenes[current].is_finished() {
            self.scenes[current].next()?;
            if self.previous.is_some() && self.scenes[current].is_after_transition_in() {
                self.drop_previous();
            }
        }

        self.transition_if_ready()?;
        self.update_finished();
        Ok(!self.finished)
    }

    /// Move to `target`, resetting scenes only when continuing forward cannot reach it.
    #[tracing::instrument(skip(self), fields(from = self.frame))]
    pub fn seek(&mut self, target: FrameIndex) -> ReelResult<()> {
        let target = target.0;
        let current = &self.scenes[self.current];
        let cached_before = current.cache.last_frame.is_some_and(|last| last < target);

        if target < self.frame || cached_before {
            let best = self.find_best_scene(target);
            if best != self.current || target < self.frame {
                let first = self.first_frame_of(best);
                tracing::debug!(scene = %self.scenes[best].name(), first, target, "seek resets scene");
                self.current = best;
                self.restart_at(first)?;
            }
        }

        while self.frame < target && !self.finished {
            self.advance()?;
        }
        Ok(())
    }

    /// Snapshot of every visible scene at the current frame.
    pub fn snapshot(&self) -> ReelResult<RenderedFrame> {
        let index = FrameIndex(self.frame);
        let time_secs = self.settings.fps.frames_to_secs(self.frame);
        let mut scenes = Vec::with_capacity(2);
        if let Some(prev) = self.previous {
            scenes.push(self.scenes[prev].render(index, time_secs)?);
        }
        scenes.push(self.scenes[self.current].render(index, time_secs)?);
        Ok(RenderedFrame {
            index,
            time_secs,
            scenes,
        })
    }

    /// Total frames, from the settings or from a dry run.
    pub fn duration(&mut self) -> ReelResult<u64> {
        match self.duration {
            Some(d) => Ok(d),
            None => self.recalculate(),
        }
    }

    /// Dry-run every scene once, caching its frame bounds, and return the total duration.
    ///
    /// The player is back at frame 0 afterwards.
    pub fn recalculate(&mut self) -> ReelResult<u64> {
        let limit = self.settings.max_dry_run_frames;
        self.previous = None;
        let mut frame = 0u64;

        for i in 0..self.scenes.len() {
            let scene = &mut self.scenes[i];
            scene.cache.transition_frames = None;
            scene.cache.last_frame = None;
            scene.reset(frame)?;
            scene.cache.entered_in_transition = i > 0 && !scene.is_after_transition_in();

            let first = frame;
            while !scene.can_transition_out() {
                if scene.cache.transition_frames.is_none() && scene.is_after_transition_in() {
                    scene.cache.transition_frames = Some(frame - first);
                }
                if frame - first >= limit {
                    return Err(ReelError::validation(format!(
                        "scene '{}' did not finish within {limit} frames",
                        scene.name()
                    )));
                }
                frame += 1;
                scene.next()?;
            }
            if scene.cache.transition_frames.is_none() {
                scene.cache.transition_frames = Some(frame - first);
            }
            scene.cache.last_frame = Some(frame);
        }

        tracing::debug!(duration = frame, "recalculated project duration");
        self.duration = Some(frame);
        self.current = 0;
        self.restart_at(0)?;
        Ok(frame)
    }

    /// Render `range` (or the configured range, or everything) into `exporter`.
    ///
    /// A failure stops the exporter and is reported as [`ReelError::PartialRender`] carrying the
    /// number of frames already handed over.
    #[tracing::instrument(skip(self, exporter))]
    pub fn render(
        &mut self,
        range: Option<FrameRange>,
        exporter: &mut dyn Exporter,
    ) -> ReelResult<RenderStats> {
        let duration = self.duration()?;
        let range = match range.or(self.settings.range) {
            Some(r) => r,
            None => FrameRange::new(FrameIndex(0), FrameIndex(duration))?,
        };
        if range.is_empty() {
            return Err(ReelError::validation("render range must be non-empty"));
        }
        if range.end.0 > duration {
            return Err(ReelError::validation(
                "render range must be within project duration",
            ));
        }

        exporter.start(ExportConfig {
            fps: self.settings.fps,
            range,
        })?;

        let mut stats = RenderStats {
            frames_total: range.len_frames(),
            frames_committed: 0,
        };
        if let Err(e) = self.render_frames(range, exporter, &mut stats) {
            if let Err(stop_err) = exporter.stop() {
                tracing::warn!(error = %stop_err, "exporter failed to stop after render error");
            }
            tracing::error!(committed = stats.frames_committed, error = %e, "render aborted");
            return Err(ReelError::PartialRender {
                committed: stats.frames_committed,
                source: Box::new(e),
            });
        }
        exporter.stop()?;
        Ok(stats)
    }

    fn render_frames(
        &mut self,
        range: FrameRange,
        exporter: &mut dyn Exporter,
        stats: &mut RenderStats,
    ) -> ReelResult<()> {
        for f in range.start.0..range.end.0 {
            self.seek(FrameIndex(f))?;
            let frame = self.snapshot()?;
            exporter.handle_frame(&frame, FrameIndex(f))?;
            stats.frames_committed += 1;
        }
        Ok(())
    }

    /// Reset the current scene at `first` and enter any transitions it allows right away.
    fn restart_at(&mut self, first: u64) -> ReelResult<()> {
        self.previous = None;
        self.finished = false;
        self.frame = first;
        self.scenes[self.current].reset(first)?;
        self.transition_if_ready()?;
        self.update_finished();
        Ok(())
    }

    fn transition_if_ready(&mut self) -> ReelResult<()> {
        loop {
            let current = self.current;
            if !self.scenes[current].can_transition_out() {
                return Ok(());
            }
            if self.scenes[current].cache.last_frame.is_none() {
                self.scenes[current].cache.last_frame = Some(self.frame);
            }
            let next = current + 1;
            if next >= self.scenes.len() {
                return Ok(());
            }

            tracing::debug!(
                from = %self.scenes[current].name(),
                to = %self.scenes[next].name(),
                frame = self.frame,
                "scene transition"
            );
            self.previous = Some(current);
            self.current = next;
            self.scenes[next].reset(self.frame)?;
            if self.scenes[next].is_after_transition_in() {
                self.drop_previous();
            } else {
                self.scenes[next].cache.entered_in_transition = true;
            }
        }
    }

    fn drop_previous(&mut self) {
        if self.previous.take().is_some() {
            let scene = &mut self.scenes[self.current];
            if scene.cache.transition_frames.is_none() {
                scene.cache.transition_frames = Some(self.frame - scene.cache.first_frame);
            }
        }
    }

    fn update_finished(&mut self) {
        self.finished =
            self.current + 1 == self.scenes.len() && self.scenes[self.current].is_finished();
    }

    fn first_frame_of(&self, index: usize) -> u64 {
        if index == 0 {
            return 0;
        }
        self.scenes[index - 1]
            .cache
            .last_frame
            .unwrap_or(self.scenes[index].cache.first_frame)
    }

    /// Earliest scene whose reset reconstructs the state at `target`.
    fn find_best_scene(&self, target: u64) -> usize {
        let mut best = self.scenes.len() - 1;
        for (i, scene) in self.scenes.iter().enumerate() {
            match scene.cache.last_frame {
                Some(last) if last <= target => continue,
                _ => {
                    best = i;
                    break;
                }
            }
        }

        // A scene entered during a cross-fade cannot be reset on its own while the outgoing
        // scene is still visible at `target`.
        while best > 0 {
            let cache = &self.scenes[best].cache;
            if !cache.entered_in_transition {
                break;
            }
            let fade_end = cache
                .transition_frames
                .map_or(u64::MAX, |n| cache.first_frame.saturating_add(n));
            if target >= fade_end {
                break;
            }
            best -= 1;
        }
        best
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/player.rs"]
mod tests;
