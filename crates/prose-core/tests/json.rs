mod common;

use common::{blockquote, doc, hr, p, p_id, schema, state};
use gpui_prose_core::{EditorState, NodeSelection, SchemaError, Selection, StateConfig, Step};
use serde_json::json;

#[test]
fn state_round_trips_through_json() -> anyhow::Result<()> {
    let original = state(
        doc(vec![p_id("p-1", "hello"), blockquote(vec![p("quoted")]), hr()]),
        2,
        4,
    );
    let value = original.to_json();
    assert_eq!(value["selection"], json!({"type": "text", "anchor": 2, "head": 4}));

    let restored = EditorState::from_json(StateConfig::new(schema()), &value)?;
    assert_eq!(restored.doc(), original.doc());
    assert_eq!(restored.selection(), original.selection());
    Ok(())
}

#[test]
fn node_selections_serialize_by_position() -> anyhow::Result<()> {
    let d = doc(vec![p("a"), hr()]);
    let selection = <Selection as From<NodeSelection>>::from(NodeSelection::create(&d, 3)?);
    let value = selection.to_json();
    assert_eq!(value, json!({"type": "node", "anchor": 3}));
    assert_eq!(Selection::from_json(&d, &value)?, selection);
    Ok(())
}

#[test]
fn invalid_documents_are_rejected() {
    let schema = schema();
    let unknown = schema.node_from_json(&json!({"type": "doc", "content": [{"type": "video"}]}));
    assert_eq!(unknown.unwrap_err(), SchemaError::UnknownNodeType("video".into()));

    let inline_at_top = schema.node_from_json(&json!({
        "type": "doc",
        "content": [{"type": "text", "text": "loose"}]
    }));
    assert!(inline_at_top.is_err());
}

#[test]
fn recorded_steps_replay_from_json() -> anyhow::Result<()> {
    let state = state(doc(vec![p("hello"), p("world")]), 1, 1);
    let mut tr = state.tr();
    tr.insert_text("!", 6, 6)?;
    tr.delete(4, 11)?;

    let mut replayed = state.doc().clone();
    for step in tr.steps() {
        let step = Step::from_json(state.schema(), &step.to_json())?;
        replayed = step.apply(&replayed).doc().cloned().unwrap();
    }
    assert_eq!(&replayed, tr.doc());
    assert_eq!(replayed.text_content(), "helrld");
    Ok(())
}

#[test]
fn positions_map_across_a_whole_transaction() {
    let state = state(doc(vec![p("hello"), p("world")]), 1, 1);
    let mut tr = state.tr();
    tr.insert_text("ab", 1, 1).unwrap();
    tr.split(5, 1).unwrap();

    let mapping = tr.mapping();
    assert_eq!(mapping.map(1, -1), 1);
    assert_eq!(mapping.map(1, 1), 3);
    assert_eq!(mapping.map(10, 1), 14);
    assert!(!mapping.map_result(3, 1).deleted);
}

#[test]
fn malformed_steps_from_json_fail_softly() -> anyhow::Result<()> {
    let state = state(doc(vec![p("hello"), p("world")]), 1, 1);
    let para = json!([{"type": "paragraph", "content": [{"type": "text", "text": "x"}]}]);
    let malformed = [
        json!({"stepType": "replace", "from": 9, "to": 3}),
        json!({"stepType": "replace", "from": 0, "to": 0,
               "slice": {"content": para, "openEnd": 3}}),
        json!({"stepType": "replace", "from": 2, "to": 3,
               "slice": {"openStart": 1, "openEnd": 1}}),
        json!({"stepType": "replace", "from": 20, "to": 22}),
        json!({"stepType": "attr", "pos": 40, "attr": "id", "value": "p-1"}),
    ];

    for value in &malformed {
        let step = Step::from_json(state.schema(), value)?;
        assert!(step.apply(state.doc()).failed().is_some(), "{value}");

        let mut tr = state.tr();
        assert!(tr.step(step).is_err(), "{value}");
        assert!(!tr.doc_changed());
        assert!(tr.doc().ptr_eq(state.doc()));
    }
    Ok(())
}
