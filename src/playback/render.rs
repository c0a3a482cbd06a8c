use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};

/// Properties recorded by one scene's drawables for one frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SceneFrame {
    pub name: String,
    pub props: serde_json::Map<String, serde_json::Value>,
}

/// Snapshot of every visible scene at one frame, handed to exporters.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderedFrame {
    pub index: FrameIndex,
    pub time_secs: f64,
    /// Outgoing scene first during a cross-fade, then the active one.
    pub scenes: Vec<SceneFrame>,
}

impl RenderedFrame {
    /// Recorded property `key` of scene `scene`, if present.
    pub fn prop(&self, scene: &str, key: &str) -> Option<&serde_json::Value> {
        self.scenes
            .iter()
            .find(|s| s.name == scene)
            .and_then(|s| s.props.get(key))
    }
}

/// Context handed to [`Drawable::render`].
pub struct RenderCx<'a> {
    scene: &'a str,
    frame: FrameIndex,
    time_secs: f64,
    props: &'a mut serde_json::Map<String, serde_json::Value>,
}

impl<'a> RenderCx<'a> {
    pub(crate) fn new(
        scene: &'a str,
        frame: FrameIndex,
        time_secs: f64,
        props: &'a mut serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            scene,
            frame,
            time_secs,
            props,
        }
    }

    pub fn scene(&self) -> &str {
        self.scene
    }

    pub fn frame(&self) -> FrameIndex {
        self.frame
    }

    pub fn time_secs(&self) -> f64 {
        self.time_secs
    }

    /// Store `value` under `key` in this frame's snapshot. Later writes to the same key win.
    pub fn record(&mut self, key: impl Into<String>, value: impl serde::Serialize) -> ReelResult<()> {
        let value = serde_json::to_value(value).map_err(|e| ReelError::serde(e.to_string()))?;
        self.props.insert(key.into(), value);
        Ok(())
    }
}

/// Component rendered once per frame while its scene is visible.
///
/// Drawables typically read signals and [`RenderCx::record`] the values they would draw.
pub trait Drawable {
    fn render(&self, cx: &mut RenderCx<'_>) -> ReelResult<()>;
}

impl<F> Drawable for F
where
    F: Fn(&mut RenderCx<'_>) -> ReelResult<()>,
{
    fn render(&self, cx: &mut RenderCx<'_>) -> ReelResult<()> {
        self(cx)
    }
}

/// Range render statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Total frames in the requested range.
    pub frames_total: u64,
    /// Frames handed to the exporter.
    pub frames_committed: u64,
}

#[cfg(test)]
#[path = "../../tests/unit/playback/render.rs"]
mod tests;
