use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::{Fps, FrameRange};
use crate::foundation::error::{ReelError, ReelResult};
use crate::thread::scheduler::{DEFAULT_LOOP_STALL_LIMIT, DEFAULT_STALL_LIMIT};

/// Upper bound on frames simulated by a dry run when no duration is configured.
pub const DEFAULT_MAX_DRY_RUN_FRAMES: u64 = 1_000_000;

/// Playback configuration of a [`crate::Project`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub fps: Fps,
    /// Frames to render. `None` renders the whole project.
    pub range: Option<FrameRange>,
    /// Precomputed total duration. `None` runs a dry-run pass to measure it.
    pub duration_frames: Option<u64>,
    /// Maximum thread resumptions within one frame.
    pub stall_limit: usize,
    /// Maximum consecutive non-suspending iterations of an unbounded loop.
    pub loop_stall_limit: usize,
    /// Frames a dry run may simulate before giving up.
    pub max_dry_run_frames: u64,
    /// Named project variables, read by scenes through `SceneCx::variable`.
    pub variables: serde_json::Map<String, serde_json::Value>,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            range: None,
            duration_frames: None,
            stall_limit: DEFAULT_STALL_LIMIT,
            loop_stall_limit: DEFAULT_LOOP_STALL_LIMIT,
            max_dry_run_frames: DEFAULT_MAX_DRY_RUN_FRAMES,
            variables: serde_json::Map::new(),
        }
    }
}

impl PlayerSettings {
    pub fn from_json_str(s: &str) -> ReelResult<Self> {
        let settings: Self = serde_json::from_str(s).map_err(|e| ReelError::serde(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ReelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings '{}'", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> ReelResult<()> {
        if self.fps.num == 0 || self.fps.den == 0 {
            return Err(ReelError::validation("fps must have num>0 and den>0"));
        }
        if let Some(range) = self.range {
            if range.start.0 > range.end.0 {
                return Err(ReelError::validation("range start must be <= end"));
            }
            if range.is_empty() {
                return Err(ReelError::validation("range must be non-empty"));
            }
            if let Some(total) = self.duration_frames
                && range.end.0 > total
            {
                return Err(ReelError::validation(
                    "range must be within duration_frames",
                ));
            }
        }
        if self.stall_limit == 0 || self.loop_stall_limit == 0 {
            return Err(ReelError::validation("stall limits must be > 0"));
        }
        if self.max_dry_run_frames == 0 {
            return Err(ReelError::validation("max_dry_run_frames must be > 0"));
        }
        Ok(())
    }

    pub fn with_fps(mut self, fps: Fps) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/settings.rs"]
mod tests;
