use super::*;

use crate::animation::ease::Ease;
use crate::encode::exporter::InMemoryExporter;
use crate::flow::wait::wait_for;
use crate::foundation::core::{Fps, FrameIndex};
use crate::playback::settings::PlayerSettings;
use crate::signal::signal::Signal;
use crate::thread::task::Task;

fn project() -> ReelResult<Project> {
    let settings = PlayerSettings::default().with_fps(Fps::new(10, 1)?);
    Ok(Project::new(settings)
        .scene("count", |cx| {
            let n = Signal::constant(0.0);
            {
                let n = n.clone();
                cx.add(move |r| r.record("n", n.get()));
            }
            let cx = cx.clone();
            Task::new("count", async move {
                n.tween(10.0, 1.0, Ease::InOutQuad).await?;
                cx.finish();
                Ok(())
            })
        })
        .scene("hold", |cx| {
            let fade = cx.transition_in(0.3);
            let progress = cx.transition_progress();
            cx.add(move |r| r.record("progress", progress.get()));
            Task::new("hold", async move {
                fade.await?;
                wait_for(0.5).await
            })
        }))
}

fn full_render() -> Vec<crate::playback::render::RenderedFrame> {
    let mut player = Player::new(project().unwrap()).unwrap();
    let mut exporter = InMemoryExporter::new();
    player.render(None, &mut exporter).unwrap();
    exporter.frames
}

#[test]
fn split_segments_concatenate_to_the_full_render() {
    let reference = full_render();
    let total = reference.len() as u64;
    let range = FrameRange::new(FrameIndex(0), FrameIndex(total)).unwrap();

    let segments = render_split(project, range, 3, |_| InMemoryExporter::new()).unwrap();
    assert_eq!(segments.len(), 3);
    assert_eq!(segments[0].range.start, FrameIndex(0));
    assert_eq!(segments[2].range.end, FrameIndex(total));

    let mut joined = Vec::new();
    for segment in &segments {
        assert_eq!(segment.stats.frames_committed, segment.range.len_frames());
        joined.extend(segment.exporter.frames.iter().cloned());
    }
    assert_eq!(joined, reference);
}

#[test]
fn more_workers_than_frames_yield_one_frame_segments() {
    let range = FrameRange::new(FrameIndex(4), FrameIndex(6)).unwrap();
    let segments = render_split(project, range, 8, |_| InMemoryExporter::new()).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].exporter.frames[0].index, FrameIndex(5));
}

#[test]
fn zero_workers_is_rejected() {
    let range = FrameRange::new(FrameIndex(0), FrameIndex(4)).unwrap();
    let err = render_split(project, range, 0, |_| InMemoryExporter::new()).unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
}

#[test]
fn project_errors_surface_from_workers() {
    let range = FrameRange::new(FrameIndex(0), FrameIndex(4)).unwrap();
    let err = render_split(
        || Err(ReelError::validation("no project")),
        range,
        2,
        |_| InMemoryExporter::new(),
    )
    .unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
}
