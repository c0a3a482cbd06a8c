use crate::foundation::core::{Fps, FrameIndex, FrameRange};
use crate::foundation::error::ReelResult;
use crate::playback::render::RenderedFrame;

/// Configuration provided to an [`Exporter`] at the start of a range render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportConfig {
    pub fps: Fps,
    /// Frames that will be handed over, in order.
    pub range: FrameRange,
}

/// Consumer of rendered frames.
///
/// Ordering contract: `start` once, then `handle_frame` exactly once per frame of the range in
/// strictly increasing `FrameIndex` order, then `stop`. `stop` is also called when the render
/// aborts early.
pub trait Exporter {
    fn start(&mut self, cfg: ExportConfig) -> ReelResult<()>;
    fn handle_frame(&mut self, frame: &RenderedFrame, index: FrameIndex) -> ReelResult<()>;
    fn stop(&mut self) -> ReelResult<()>;
}

impl<E: Exporter + ?Sized> Exporter for &mut E {
    fn start(&mut self, cfg: ExportConfig) -> ReelResult<()> {
        (**self).start(cfg)
    }

    fn handle_frame(&mut self, frame: &RenderedFrame, index: FrameIndex) -> ReelResult<()> {
        (**self).handle_frame(frame, index)
    }

    fn stop(&mut self) -> ReelResult<()> {
        (**self).stop()
    }
}

/// In-memory exporter for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemoryExporter {
    cfg: Option<ExportConfig>,
    stopped: bool,
    /// Frames in timeline order.
    pub frames: Vec<RenderedFrame>,
}

impl InMemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<ExportConfig> {
        self.cfg
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl Exporter for InMemoryExporter {
    fn start(&mut self, cfg: ExportConfig) -> ReelResult<()> {
        self.cfg = Some(cfg);
        self.stopped = false;
        self.frames.clear();
        Ok(())
    }

    fn handle_frame(&mut self, frame: &RenderedFrame, _index: FrameIndex) -> ReelResult<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn stop(&mut self) -> ReelResult<()> {
        self.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/exporter.rs"]
mod tests;
