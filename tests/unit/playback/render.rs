use super::*;

use std::collections::BTreeMap;

#[test]
fn record_stores_serialized_values_and_later_writes_win() {
    let mut props = serde_json::Map::new();
    let mut cx = RenderCx::new("intro", FrameIndex(3), 0.1, &mut props);
    assert_eq!(cx.scene(), "intro");
    assert_eq!(cx.frame(), FrameIndex(3));
    assert_eq!(cx.time_secs(), 0.1);

    cx.record("opacity", 0.5).unwrap();
    cx.record("label", "hello").unwrap();
    cx.record("opacity", 0.75).unwrap();

    assert_eq!(props.len(), 2);
    assert_eq!(props["opacity"], serde_json::json!(0.75));
    assert_eq!(props["label"], serde_json::json!("hello"));
}

#[test]
fn unserializable_values_are_serde_errors() {
    let mut props = serde_json::Map::new();
    let mut cx = RenderCx::new("intro", FrameIndex(0), 0.0, &mut props);
    let mut bad = BTreeMap::new();
    bad.insert((1u8, 2u8), 3u8);
    assert!(matches!(cx.record("bad", bad), Err(ReelError::Serde(_))));
}

#[test]
fn closures_are_drawables() {
    let drawable = |cx: &mut RenderCx<'_>| cx.record("frame", cx.frame().0);
    let mut props = serde_json::Map::new();
    let mut cx = RenderCx::new("s", FrameIndex(7), 0.0, &mut props);
    Drawable::render(&drawable, &mut cx).unwrap();
    assert_eq!(props["frame"], serde_json::json!(7));
}

#[test]
fn prop_looks_up_by_scene_and_key() {
    let mut props = serde_json::Map::new();
    props.insert("x".to_owned(), serde_json::json!(1));
    let frame = RenderedFrame {
        index: FrameIndex(0),
        time_secs: 0.0,
        scenes: vec![
            SceneFrame {
                name: "a".to_owned(),
                props: serde_json::Map::new(),
            },
            SceneFrame {
                name: "b".to_owned(),
                props,
            },
        ],
    };
    assert_eq!(frame.prop("b", "x"), Some(&serde_json::json!(1)));
    assert_eq!(frame.prop("a", "x"), None);
    assert_eq!(frame.prop("c", "x"), None);
}
