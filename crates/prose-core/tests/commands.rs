mod common;

use common::{blockquote, blocks, cursor, doc, h, hr, p, run, state};
use gpui_prose_core::{
    Selection, base_keymap, chain_commands, command, core_commands, delete_backward,
    delete_forward, join_backward, join_forward, split_block,
};

#[test]
fn split_block_at_cursor() {
    let state = state(doc(vec![p("hello world")]), 6, 6);
    let next = run(&state, split_block).unwrap();
    assert_eq!(blocks(&next), vec!["hello", " world"]);
    assert_eq!(cursor(&next), 8);
}

#[test]
fn split_block_inside_an_empty_block() {
    let state = state(doc(vec![p("")]), 1, 1);
    let next = run(&state, split_block).unwrap();
    assert_eq!(blocks(&next), vec!["", ""]);
    assert_eq!(cursor(&next), 3);

    assert!(!delete_backward(&state, None));
    assert!(!delete_forward(&state, None));
}

#[test]
fn deleting_the_whole_document_leaves_an_empty_block() {
    let one = state(doc(vec![p("hello")]), 0, 7);
    let next = run(&one, delete_backward).unwrap();
    assert_eq!(blocks(&next), vec![""]);
    assert_eq!(cursor(&next), 1);

    let two = state(doc(vec![p("hello"), p("world")]), 0, 14);
    let next = run(&two, delete_forward).unwrap();
    assert_eq!(blocks(&next), vec![""]);
}

#[test]
fn join_backward_merges_into_previous_block() {
    let state = state(doc(vec![p("hello"), p("world")]), 8, 8);
    let next = run(&state, join_backward).unwrap();
    assert_eq!(blocks(&next), vec!["helloworld"]);
    assert_eq!(cursor(&next), 6);
}

#[test]
fn join_backward_removes_empty_block() {
    let state = state(doc(vec![p("hello"), p("")]), 8, 8);
    let next = run(&state, join_backward).unwrap();
    assert_eq!(blocks(&next), vec!["hello"]);
    assert_eq!(next.doc().child_count(), 1);
    assert_eq!(cursor(&next), 6);
}

#[test]
fn split_block_replaces_selection() {
    let state = state(doc(vec![p("hello world")]), 3, 8);
    let next = run(&state, split_block).unwrap();
    assert_eq!(blocks(&next), vec!["he", "orld"]);
    assert_eq!(cursor(&next), 5);
}

#[test]
fn join_forward_pulls_next_block_in() {
    let state = state(doc(vec![p("hello"), p("world")]), 6, 6);
    let next = run(&state, join_forward).unwrap();
    assert_eq!(blocks(&next), vec!["helloworld"]);
    assert_eq!(cursor(&next), 6);
}

#[test]
fn split_then_join_backward_restores_the_block() {
    let original = doc(vec![p("hello world")]);
    for pos in 1..=12 {
        let state = state(original.clone(), pos, pos);
        let split = run(&state, split_block).unwrap();
        assert_eq!(split.doc().child_count(), 2);
        let joined = run(&split, join_backward).unwrap();
        assert_eq!(joined.doc(), &original, "split at {pos}");
        assert_eq!(cursor(&joined), pos);
    }
}

#[test]
fn split_keeps_the_block_type() {
    let state = state(doc(vec![h(2, "title")]), 3, 3);
    let next = run(&state, split_block).unwrap();
    let second = next.doc().child(1);
    assert_eq!(second.node_type().name(), "heading");
    assert_eq!(second.attr("level").and_then(|v| v.as_u64()), Some(2));
}

#[test]
fn delete_removes_one_unit_around_the_cursor() {
    let original = doc(vec![p("hello")]);
    for pos in 2..=5 {
        let back = run(&state(original.clone(), pos, pos), delete_backward).unwrap();
        assert_eq!(back.doc().content().size(), original.content().size() - 1);
        assert_eq!(cursor(&back), pos - 1);
    }
    for pos in 1..=5 {
        let fwd = run(&state(original.clone(), pos, pos), delete_forward).unwrap();
        assert_eq!(fwd.doc().content().size(), original.content().size() - 1);
        assert_eq!(cursor(&fwd), pos);
    }

    let back = run(&state(original.clone(), 3, 3), delete_backward).unwrap();
    assert_eq!(blocks(&back), vec!["hllo"]);
    let fwd = run(&state(original, 3, 3), delete_forward).unwrap();
    assert_eq!(blocks(&fwd), vec!["helo"]);
}

#[test]
fn commands_are_noops_at_document_boundaries() {
    let d = doc(vec![p("hello"), p("world")]);
    let start = state(d.clone(), 1, 1);
    assert!(!join_backward(&start, None));
    assert!(!delete_backward(&start, None));
    assert!(run(&start, delete_backward).is_none());

    let end = state(d, 13, 13);
    assert!(!join_forward(&end, None));
    assert!(!delete_forward(&end, None));
    assert!(run(&end, delete_forward).is_none());
}

#[test]
fn joins_are_noops_mid_block() {
    let state = state(doc(vec![p("hello"), p("world")]), 3, 3);
    assert!(!join_backward(&state, None));
    assert!(!join_forward(&state, None));

    let ranged = common::state(doc(vec![p("hello"), p("world")]), 8, 10);
    assert!(!join_backward(&ranged, None));
}

#[test]
fn dry_run_without_dispatch_changes_nothing() {
    let state = state(doc(vec![p("hello world")]), 6, 6);
    let before = state.doc().clone();
    assert!(split_block(&state, None));
    assert!(delete_backward(&state, None));
    assert_eq!(state.doc(), &before);
    assert!(state.doc().ptr_eq(&before));
}

#[test]
fn delete_backward_merges_a_cross_block_selection() {
    let state = state(doc(vec![p("hello"), p("world")]), 4, 10);
    let next = run(&state, delete_backward).unwrap();
    assert_eq!(blocks(&next), vec!["helrld"]);
    assert_eq!(cursor(&next), 4);
}

#[test]
fn join_backward_deletes_a_preceding_rule() {
    let state = state(doc(vec![hr(), p("a")]), 2, 2);
    let next = run(&state, join_backward).unwrap();
    assert_eq!(next.doc(), &doc(vec![p("a")]));
    assert_eq!(cursor(&next), 1);
}

#[test]
fn join_forward_deletes_a_following_rule() {
    let state = state(doc(vec![p("a"), hr(), p("b")]), 2, 2);
    let next = run(&state, join_forward).unwrap();
    assert_eq!(blocks(&next), vec!["a", "b"]);
    assert_eq!(cursor(&next), 2);
}

#[test]
fn join_backward_reaches_into_a_preceding_quote() {
    let state = state(doc(vec![blockquote(vec![p("a")]), p("b")]), 6, 6);
    let next = run(&state, join_backward).unwrap();
    assert_eq!(next.doc(), &doc(vec![blockquote(vec![p("ab")])]));
    assert_eq!(cursor(&next), 3);
}

#[test]
fn chain_runs_the_first_applicable_command() {
    let chained = chain_commands(vec![command(join_backward), command(delete_backward)]);
    let mid = state(doc(vec![p("hello")]), 3, 3);
    let next = run(&mid, |s, d| chained(s, d)).unwrap();
    assert_eq!(blocks(&next), vec!["hllo"]);

    let start = state(doc(vec![p("hello")]), 1, 1);
    assert!(!chained(&start, None));
}

#[test]
fn keymap_dispatches_bound_commands() {
    let keymap = base_keymap();
    let state = state(doc(vec![p("hello world")]), 6, 6);
    let next = run(&state, |s, d| keymap.handle("Enter", s, d)).unwrap();
    assert_eq!(blocks(&next), vec!["hello", " world"]);
    assert!(!keymap.handle("F13", &state, None));
}

#[test]
fn core_commands_are_registered_by_id() {
    let commands = core_commands();
    let ids: Vec<&str> = commands.iter().map(|c| c.id.as_str()).collect();
    assert!(ids.contains(&"core.split_block"));
    assert!(ids.contains(&"history.undo"));

    let split = commands.iter().find(|c| c.id == "core.split_block").unwrap();
    let state = state(doc(vec![p("ab")]), 2, 2);
    let next = run(&state, |s, d| (split.run)(s, d)).unwrap();
    assert_eq!(blocks(&next), vec!["a", "b"]);
    assert!(matches!(next.selection(), Selection::Text(_)));
}
