mod common;

use std::sync::Arc;

use common::{blocks, cursor, doc, p, run, state_with};
use gpui_prose_core::{
    EditorState, HistoryConfig, NodeIdPlugin, Plugin, history, redo, redo_depth, split_block,
    undo, undo_depth,
};

fn with_history(text: &str, pos: usize, depth: usize) -> EditorState {
    let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(history(HistoryConfig { depth }))];
    state_with(doc(vec![p(text)]), pos, pos, plugins)
}

fn type_text(state: &EditorState, text: &str, pos: usize) -> EditorState {
    let mut tr = state.tr();
    tr.insert_text(text, pos, pos).unwrap();
    state.apply(tr).unwrap()
}

#[test]
fn undo_and_redo_restore_text_and_selection() {
    let s0 = with_history("hello", 6, 0);
    assert!(!undo(&s0, None));

    let s1 = type_text(&s0, " world", 6);
    assert_eq!(undo_depth(&s1), 1);
    assert!(undo(&s1, None));
    assert_eq!(blocks(&s1), vec!["hello world"]);

    let s2 = run(&s1, undo).unwrap();
    assert_eq!(blocks(&s2), vec!["hello"]);
    assert_eq!(cursor(&s2), 6);
    assert_eq!(undo_depth(&s2), 0);
    assert_eq!(redo_depth(&s2), 1);

    let s3 = run(&s2, redo).unwrap();
    assert_eq!(blocks(&s3), vec!["hello world"]);
    assert_eq!(cursor(&s3), 12);
    assert_eq!(undo_depth(&s3), 1);
    assert_eq!(redo_depth(&s3), 0);
}

#[test]
fn a_new_change_clears_redo() {
    let s1 = type_text(&with_history("hello", 6, 0), "!", 6);
    let s2 = run(&s1, undo).unwrap();
    assert_eq!(redo_depth(&s2), 1);
    let s3 = type_text(&s2, "?", 6);
    assert_eq!(redo_depth(&s3), 0);
    assert!(!redo(&s3, None));
}

#[test]
fn depth_bounds_the_undo_stack() {
    let mut state = with_history("a", 2, 2);
    for _ in 0..3 {
        let pos = state.doc().content().size() - 1;
        state = type_text(&state, "b", pos);
    }
    assert_eq!(undo_depth(&state), 2);
}

#[test]
fn unrecorded_changes_are_mapped_not_undone() {
    let s1 = type_text(&with_history("hello", 6, 0), " world", 6);

    let mut tr = s1.tr();
    tr.insert_text("X", 1, 1).unwrap();
    tr.set_add_to_history(false);
    let s2 = s1.apply(tr).unwrap();
    assert_eq!(undo_depth(&s2), 1);

    let s3 = run(&s2, undo).unwrap();
    assert_eq!(blocks(&s3), vec!["Xhello"]);
}

#[test]
fn undo_reverts_a_split_but_keeps_assigned_ids_out_of_history() {
    let plugins: Vec<Arc<dyn Plugin>> = vec![
        Arc::new(history(HistoryConfig::default())),
        Arc::new(NodeIdPlugin::new()),
    ];
    let s0 = state_with(doc(vec![p("hello world")]), 6, 6, plugins);
    let s1 = run(&s0, split_block).unwrap();
    assert_eq!(blocks(&s1), vec!["hello", " world"]);
    assert_eq!(undo_depth(&s1), 1);

    let s2 = run(&s1, undo).unwrap();
    assert_eq!(blocks(&s2), vec!["hello world"]);
    assert_eq!(undo_depth(&s2), 0);
    assert!(s2.doc().child(0).attr("id").is_some_and(|id| id.is_string()));
}
