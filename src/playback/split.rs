use rayon::prelude::*;

use crate::encode::exporter::Exporter;
use crate::foundation::core::FrameRange;
use crate::foundation::error::{ReelError, ReelResult};
use crate::playback::player::{Player, Project};
use crate::playback::render::RenderStats;

/// One independently rendered slice of a split render.
#[derive(Debug)]
pub struct Segment<E> {
    pub range: FrameRange,
    pub stats: RenderStats,
    pub exporter: E,
}

/// Render `range` as `workers` contiguous segments on a dedicated rayon pool.
///
/// Every segment builds its own [`Project`] through `project` and seeks straight to its first
/// frame, so segments share no state. Concatenating the segments' frames in order yields the
/// same frames as one continuous render. Segments are returned in timeline order.
pub fn render_split<P, X, E>(
    project: P,
    range: FrameRange,
    workers: usize,
    exporter: X,
) -> ReelResult<Vec<Segment<E>>>
where
    P: Fn() -> ReelResult<Project> + Sync,
    X: Fn(FrameRange) -> E + Sync,
    E: Exporter + Send,
{
    if workers == 0 {
        return Err(ReelError::validation("render_split 'workers' must be >= 1"));
    }
    let segments = range.split(workers);
    if segments.is_empty() {
        return Err(ReelError::validation("render_split range must be non-empty"));
    }

    let pool = build_thread_pool(Some(segments.len()))?;
    tracing::debug!(segments = segments.len(), frames = range.len_frames(), "split render");
    pool.install(|| {
        segments
            .par_iter()
            .map(|&seg| {
                let mut player = Player::new(project()?)?;
                let mut out = exporter(seg);
                let stats = player.render(Some(seg), &mut out)?;
                Ok(Segment {
                    range: seg,
                    stats,
                    exporter: out,
                })
            })
            .collect::<ReelResult<Vec<_>>>()
    })
}

fn build_thread_pool(threads: Option<usize>) -> ReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ReelError::validation("thread pool size must be >= 1 when set"));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelError::evaluation(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/playback/split.rs"]
mod tests;
