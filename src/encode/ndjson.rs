use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::encode::exporter::{ExportConfig, Exporter};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{ReelError, ReelResult};
use crate::playback::render::RenderedFrame;

#[derive(Clone, Debug)]
pub struct NdjsonExporterOpts {
    pub out_path: PathBuf,
    pub overwrite: bool,
}

impl NdjsonExporterOpts {
    pub fn new(out_path: impl Into<PathBuf>) -> Self {
        Self {
            out_path: out_path.into(),
            overwrite: true,
        }
    }
}

/// Writes one JSON object per frame, one frame per line.
pub struct NdjsonExporter {
    opts: NdjsonExporterOpts,
    out: Option<BufWriter<File>>,
    written: u64,
}

impl NdjsonExporter {
    pub fn new(opts: NdjsonExporterOpts) -> Self {
        Self {
            opts,
            out: None,
            written: 0,
        }
    }

    /// Frames written since the last `start`.
    pub fn written(&self) -> u64 {
        self.written
    }
}

pub fn ensure_parent_dir(path: &Path) -> ReelResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

impl Exporter for NdjsonExporter {
    fn start(&mut self, cfg: ExportConfig) -> ReelResult<()> {
        let path = &self.opts.out_path;
        ensure_parent_dir(path)?;
        if !self.opts.overwrite && path.exists() {
            return Err(ReelError::validation(format!(
                "output file '{}' already exists",
                path.display()
            )));
        }
        let file = File::create(path)
            .with_context(|| format!("failed to create '{}'", path.display()))?;
        self.out = Some(BufWriter::new(file));
        self.written = 0;
        tracing::debug!(
            path = %path.display(),
            frames = cfg.range.len_frames(),
            "ndjson export started"
        );
        Ok(())
    }

    fn handle_frame(&mut self, frame: &RenderedFrame, _index: FrameIndex) -> ReelResult<()> {
        let Some(out) = self.out.as_mut() else {
            return Err(ReelError::validation("handle_frame called before start"));
        };
        serde_json::to_writer(&mut *out, frame).map_err(|e| ReelError::serde(e.to_string()))?;
        out.write_all(b"\n").context("failed to write frame separator")?;
        self.written += 1;
        Ok(())
    }

    fn stop(&mut self) -> ReelResult<()> {
        if let Some(mut out) = self.out.take() {
            out.flush().with_context(|| {
                format!("failed to flush '{}'", self.opts.out_path.display())
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ndjson.rs"]
mod tests;
