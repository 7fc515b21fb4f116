#![allow(dead_code)]

use std::sync::Arc;

use gpui_prose_core::{
    Attrs, Dispatch, EditorState, ID_ATTR, Node, Plugin, Schema, StateConfig, TextSelection,
    Transaction,
};
use serde_json::Value;

/// Routes the crate's `tracing` output to the test harness. `RUST_LOG`
/// selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema() -> Schema {
    Schema::basic()
}

fn inline(schema: &Schema, text: &str) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![schema.text(text, vec![]).unwrap()]
    }
}

pub fn p(text: &str) -> Node {
    let schema = schema();
    schema.node("paragraph", None, inline(&schema, text)).unwrap()
}

pub fn p_id(id: &str, text: &str) -> Node {
    let schema = schema();
    let attrs = Attrs::from([(ID_ATTR.to_string(), Value::from(id))]);
    schema
        .node("paragraph", Some(&attrs), inline(&schema, text))
        .unwrap()
}

pub fn h(level: u64, text: &str) -> Node {
    let schema = schema();
    let attrs = Attrs::from([("level".to_string(), Value::from(level))]);
    schema
        .node("heading", Some(&attrs), inline(&schema, text))
        .unwrap()
}

pub fn blockquote(children: Vec<Node>) -> Node {
    schema().node("blockquote", None, children).unwrap()
}

pub fn hr() -> Node {
    schema().node("horizontal_rule", None, vec![]).unwrap()
}

pub fn doc(children: Vec<Node>) -> Node {
    schema().node("doc", None, children).unwrap()
}

/// A state over `doc` with a text selection from `anchor` to `head`.
pub fn state(doc: Node, anchor: usize, head: usize) -> EditorState {
    state_with(doc, anchor, head, Vec::new())
}

pub fn state_with(
    doc: Node,
    anchor: usize,
    head: usize,
    plugins: Vec<Arc<dyn Plugin>>,
) -> EditorState {
    let selection = TextSelection::create(&doc, anchor, head).unwrap();
    EditorState::create(
        StateConfig::new(schema())
            .doc(doc)
            .selection(selection)
            .plugins(plugins),
    )
    .unwrap()
}

/// Runs `command` with a dispatch callback and applies what it dispatched.
/// `None` when the command did not apply.
pub fn run(
    state: &EditorState,
    command: impl Fn(&EditorState, Dispatch<'_>) -> bool,
) -> Option<EditorState> {
    let mut dispatched: Option<Transaction> = None;
    let mut sink = |tr: Transaction| dispatched = Some(tr);
    if !command(state, Some(&mut sink)) {
        assert!(dispatched.is_none(), "command dispatched but reported false");
        return None;
    }
    let tr = dispatched.expect("command applied without dispatching");
    Some(state.apply(tr).unwrap())
}

/// Text content of every top-level block.
pub fn blocks(state: &EditorState) -> Vec<String> {
    state
        .doc()
        .content()
        .iter()
        .map(Node::text_content)
        .collect()
}

pub fn cursor(state: &EditorState) -> usize {
    state.selection().cursor().expect("expected a cursor")
}
