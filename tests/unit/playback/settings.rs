use super::*;

use crate::foundation::core::FrameIndex;

#[test]
fn defaults_are_valid() {
    let settings = PlayerSettings::default();
    settings.validate().unwrap();
    assert_eq!(settings.fps, Fps::default());
    assert_eq!(settings.stall_limit, DEFAULT_STALL_LIMIT);
    assert_eq!(settings.max_dry_run_frames, DEFAULT_MAX_DRY_RUN_FRAMES);
}

#[test]
fn partial_json_keeps_defaults() {
    let settings = PlayerSettings::from_json_str(
        r#"{ "fps": { "num": 60, "den": 1 }, "variables": { "title": "Hello" } }"#,
    )
    .unwrap();
    assert_eq!(settings.fps, Fps { num: 60, den: 1 });
    assert_eq!(settings.range, None);
    assert_eq!(settings.loop_stall_limit, DEFAULT_LOOP_STALL_LIMIT);
    assert_eq!(settings.variables["title"], serde_json::json!("Hello"));
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = PlayerSettings::from_json_str("{ fps: 30 }").unwrap_err();
    assert!(matches!(err, ReelError::Serde(_)));
}

#[test]
fn zero_fps_is_rejected() {
    let err = PlayerSettings::from_json_str(r#"{ "fps": { "num": 0, "den": 1 } }"#).unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
}

#[test]
fn range_must_fit_the_configured_duration() {
    let mut settings = PlayerSettings {
        duration_frames: Some(10),
        ..PlayerSettings::default()
    };
    settings.range = Some(FrameRange::new(FrameIndex(5), FrameIndex(12)).unwrap());
    assert!(settings.validate().is_err());

    settings.range = Some(FrameRange::new(FrameIndex(5), FrameIndex(5)).unwrap());
    assert!(settings.validate().is_err());

    settings.range = Some(FrameRange::new(FrameIndex(5), FrameIndex(10)).unwrap());
    settings.validate().unwrap();
}

#[test]
fn stall_limits_must_be_positive() {
    let settings = PlayerSettings {
        loop_stall_limit: 0,
        ..PlayerSettings::default()
    };
    assert!(matches!(settings.validate(), Err(ReelError::Validation(_))));
}

#[test]
fn missing_settings_file_reports_the_path() {
    let err = PlayerSettings::from_path("/definitely/not/here/reel.json").unwrap_err();
    assert!(matches!(err, ReelError::Other(_)));
    assert!(err.to_string().contains("/definitely/not/here/reel.json"));
}

#[test]
fn builders_set_fields() {
    let settings = PlayerSettings::default()
        .with_fps(Fps { num: 24, den: 1 })
        .with_variable("speed", serde_json::json!(2.5));
    assert_eq!(settings.fps.num, 24);
    assert_eq!(settings.variables["speed"], serde_json::json!(2.5));
}
