mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{blockquote, doc, h, hr, p, p_id, run, state, state_with};
use gpui_prose_core::{
    EditorState, ID_ATTR, IdGenerator, Node, NodeIdPlugin, Plugin, split_block,
};

fn ids(doc: &Node) -> Vec<Option<String>> {
    let mut out = Vec::new();
    doc.descendants(&mut |node, _, _, _| {
        if node.node_type().has_attr(ID_ATTR) {
            out.push(node.attr(ID_ATTR).and_then(|v| v.as_str()).map(str::to_string));
        }
        !node.is_textblock()
    });
    out
}

fn with_ids(doc: Node, pos: usize) -> EditorState {
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NodeIdPlugin::new())];
    state_with(doc, pos, pos, plugins)
}

#[test]
fn assigns_ids_to_nodes_missing_one() {
    let state = with_ids(doc(vec![p("a"), blockquote(vec![h(1, "b")]), hr()]), 1);
    let mut tr = state.tr();
    tr.insert_text("x", 1, 1).unwrap();
    let (next, trs) = state.apply_transaction(tr).unwrap();

    assert_eq!(trs.len(), 2);
    assert!(!trs[1].add_to_history());
    assert_eq!(
        ids(next.doc()),
        vec![Some("p-1".to_string()), Some("p-2".to_string())]
    );
}

#[test]
fn split_gives_the_new_block_a_fresh_id() {
    let state = with_ids(doc(vec![p_id("keep", "hello world")]), 6);
    let next = run(&state, split_block).unwrap();
    assert_eq!(
        ids(next.doc()),
        vec![Some("keep".to_string()), Some("p-1".to_string())]
    );
}

#[test]
fn unchanged_documents_are_left_alone() {
    let state = with_ids(doc(vec![p("a")]), 1);
    let mut tr = state.tr();
    tr.set_meta("focus", true);
    let (next, trs) = state.apply_transaction(tr).unwrap();
    assert_eq!(trs.len(), 1);
    assert_eq!(ids(next.doc()), vec![None]);
}

#[test]
fn ensure_ids_reports_nothing_when_ids_are_unique() {
    let plugin = NodeIdPlugin::new();
    let unique = state(doc(vec![p_id("a", "x"), p_id("b", "y")]), 1, 1);
    assert!(plugin.ensure_ids(&unique).unwrap().is_none());

    let clashing = state(doc(vec![p_id("a", "x"), p_id("a", "y")]), 1, 1);
    let tr = plugin.ensure_ids(&clashing).unwrap().unwrap();
    assert_eq!(tr.steps().len(), 1);
    assert_eq!(
        ids(tr.doc()),
        vec![Some("a".to_string()), Some("p-1".to_string())]
    );
}

struct Fixed;

impl IdGenerator for Fixed {
    fn next_id(&self, taken: &HashSet<String>) -> String {
        (0..)
            .map(|n| format!("block-{n}"))
            .find(|id| !taken.contains(id))
            .unwrap()
    }
}

#[test]
fn custom_generators_are_used() {
    let plugin = NodeIdPlugin::with_generator(Fixed);
    let state = state(doc(vec![p_id("block-0", "x"), p("y")]), 1, 1);
    let tr = plugin.ensure_ids(&state).unwrap().unwrap();
    assert_eq!(
        ids(tr.doc()),
        vec![Some("block-0".to_string()), Some("block-1".to_string())]
    );
}
