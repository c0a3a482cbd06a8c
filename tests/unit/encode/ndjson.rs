use super::*;

use crate::foundation::core::{Fps, FrameRange};
use crate::playback::render::SceneFrame;

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("reel-ndjson-{}", std::process::id()))
        .join(name)
}

fn frame(i: u64) -> RenderedFrame {
    let mut props = serde_json::Map::new();
    props.insert("opacity".to_owned(), serde_json::json!(i as f64 / 2.0));
    RenderedFrame {
        index: FrameIndex(i),
        time_secs: i as f64 / 30.0,
        scenes: vec![SceneFrame {
            name: "intro".to_owned(),
            props,
        }],
    }
}

fn config() -> ExportConfig {
    ExportConfig {
        fps: Fps::default(),
        range: FrameRange::new(FrameIndex(0), FrameIndex(3)).unwrap(),
    }
}

#[test]
fn writes_one_json_object_per_line() {
    let path = scratch("nested/out.ndjson");
    let mut exporter = NdjsonExporter::new(NdjsonExporterOpts::new(&path));
    exporter.start(config()).unwrap();
    for i in 0..3 {
        exporter.handle_frame(&frame(i), FrameIndex(i)).unwrap();
    }
    exporter.stop().unwrap();
    assert_eq!(exporter.written(), 3);

    let text = std::fs::read_to_string(&path).unwrap();
    let frames: Vec<RenderedFrame> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[2], frame(2));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn refuses_to_overwrite_when_disabled() {
    let path = scratch("existing.ndjson");
    ensure_parent_dir(&path).unwrap();
    std::fs::write(&path, "keep\n").unwrap();

    let mut opts = NdjsonExporterOpts::new(&path);
    opts.overwrite = false;
    let mut exporter = NdjsonExporter::new(opts);
    assert!(matches!(
        exporter.start(config()),
        Err(ReelError::Validation(_))
    ));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep\n");
    let _ = std::fs::remove_file(&path);
}

#[test]
fn frames_before_start_are_rejected() {
    let mut exporter = NdjsonExporter::new(NdjsonExporterOpts::new(scratch("unused.ndjson")));
    assert!(exporter.handle_frame(&frame(0), FrameIndex(0)).is_err());
    assert!(exporter.stop().is_ok());
}
