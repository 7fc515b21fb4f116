use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::history::{redo, undo};
use crate::node::Node;
use crate::resolved::ResolvedPos;
use crate::selection::{Selection, TextSelection};
use crate::state::EditorState;
use crate::transaction::Transaction;

pub type Dispatch<'a> = Option<&'a mut dyn FnMut(Transaction)>;

/// A command reports whether it applies to the state and, given a dispatch
/// callback, dispatches the transaction that performs it.
pub type Command =
    Arc<dyn Fn(&EditorState, Option<&mut dyn FnMut(Transaction)>) -> bool + Send + Sync>;

fn finish(tr: Transaction, dispatch: Dispatch<'_>) -> bool {
    if let Some(dispatch) = dispatch {
        dispatch(tr);
    }
    true
}

fn reborrow<'a>(dispatch: &'a mut Dispatch<'_>) -> Dispatch<'a> {
    match dispatch {
        Some(dispatch) => Some(&mut **dispatch),
        None => None,
    }
}

fn cursor_at(tr: &mut Transaction, pos: usize) -> bool {
    match TextSelection::cursor(tr.doc(), pos) {
        Ok(sel) => {
            tr.set_selection(sel);
            true
        }
        Err(_) => false,
    }
}

fn cursor_pos(state: &EditorState) -> Option<ResolvedPos> {
    let pos = state.selection().cursor()?;
    state.doc().resolve(pos).ok()
}

pub fn delete_selection(state: &EditorState, dispatch: Dispatch<'_>) -> bool {
    if state.selection().is_empty() {
        return false;
    }
    let mut tr = state.tr();
    if let Err(err) = tr.delete_selection() {
        tracing::debug!(%err, "selection could not be deleted");
        return false;
    }
    finish(tr, dispatch)
}

/// Splits the textblock around the cursor, deleting a selected range first.
/// The cursor ends at the start of the second block.
pub fn split_block(state: &EditorState, dispatch: Dispatch<'_>) -> bool {
    let mut tr = state.tr();
    if !state.selection().is_empty() && tr.delete_selection().is_err() {
        return false;
    }
    let pos = tr.selection().from();
    let Ok(rpos) = tr.doc().resolve(pos) else {
        return false;
    };
    if !rpos.parent().is_textblock() {
        return false;
    }
    if let Err(err) = tr.split(pos, 1) {
        tracing::debug!(%err, pos, "split rejected");
        return false;
    }
    if !cursor_at(&mut tr, pos + 2) {
        return false;
    }
    finish(tr, dispatch)
}

/// Position before the closest block preceding the one holding `pos`.
fn find_cut_before(pos: &ResolvedPos) -> Option<usize> {
    (0..pos.depth())
        .rev()
        .find(|&depth| pos.index(depth) > 0)
        .map(|depth| pos.before(depth + 1))
}

fn find_cut_after(pos: &ResolvedPos) -> Option<usize> {
    (0..pos.depth())
        .rev()
        .find(|&depth| pos.index(depth) + 1 < pos.node(depth).child_count())
        .map(|depth| pos.after(depth + 1))
}

fn is_atom_block(node: &Node) -> bool {
    node.is_block() && node.is_atom()
}

pub fn join_backward(state: &EditorState, dispatch: Dispatch<'_>) -> bool {
    let Some(rpos) = cursor_pos(state) else {
        return false;
    };
    if !rpos.parent().is_textblock() || rpos.parent_offset() > 0 {
        return false;
    }
    let Some(cut) = find_cut_before(&rpos) else {
        return false;
    };
    let doc = state.doc();
    let Ok(rcut) = doc.resolve(cut) else {
        return false;
    };
    let (Some(before), Some(after)) = (rcut.node_before(), rcut.node_after()) else {
        return false;
    };

    let mut tr = state.tr();
    if is_atom_block(&before) {
        if tr.delete(cut - before.node_size(), cut).is_err() {
            return false;
        }
        tracing::debug!(cut, "deleted atom before cursor");
        return finish(tr, dispatch);
    }
    if before.is_textblock() && after.is_textblock() {
        if tr.join(cut, 1).is_err() {
            return false;
        }
        return cursor_at(&mut tr, cut - 1) && finish(tr, dispatch);
    }
    // One side is a container: merge into the last textblock before the cut.
    let Some(Selection::Text(target)) = Selection::find_from(&rcut, -1) else {
        return false;
    };
    let seam = target.head();
    if tr.delete(seam, rpos.pos()).is_err() {
        return false;
    }
    cursor_at(&mut tr, seam) && finish(tr, dispatch)
}

pub fn join_forward(state: &EditorState, dispatch: Dispatch<'_>) -> bool {
    let Some(rpos) = cursor_pos(state) else {
        return false;
    };
    let parent = rpos.parent();
    if !parent.is_textblock() || rpos.parent_offset() < parent.content().size() {
        return false;
    }
    let Some(cut) = find_cut_after(&rpos) else {
        return false;
    };
    let doc = state.doc();
    let Ok(rcut) = doc.resolve(cut) else {
        return false;
    };
    let (Some(before), Some(after)) = (rcut.node_before(), rcut.node_after()) else {
        return false;
    };

    let pos = rpos.pos();
    let mut tr = state.tr();
    if is_atom_block(&after) {
        if tr.delete(cut, cut + after.node_size()).is_err() {
            return false;
        }
        return cursor_at(&mut tr, pos) && finish(tr, dispatch);
    }
    if before.is_textblock() && after.is_textblock() {
        if tr.join(cut, 1).is_err() {
            return false;
        }
        return cursor_at(&mut tr, pos) && finish(tr, dispatch);
    }
    let Some(Selection::Text(target)) = Selection::find_from(&rcut, 1) else {
        return false;
    };
    if tr.delete(pos, target.head()).is_err() {
        return false;
    }
    cursor_at(&mut tr, pos) && finish(tr, dispatch)
}

/// Deletes the selection, or one unit before the cursor. At the start of a
/// block this is `join_backward`.
pub fn delete_backward(state: &EditorState, dispatch: Dispatch<'_>) -> bool {
    if !state.selection().is_empty() {
        return delete_selection(state, dispatch);
    }
    let Some(rpos) = cursor_pos(state) else {
        return false;
    };
    if !rpos.parent().is_textblock() {
        return false;
    }
    if rpos.parent_offset() == 0 {
        return join_backward(state, dispatch);
    }
    let pos = rpos.pos();
    let mut tr = state.tr();
    if tr.delete(pos - 1, pos).is_err() {
        return false;
    }
    cursor_at(&mut tr, pos - 1) && finish(tr, dispatch)
}

pub fn delete_forward(state: &EditorState, dispatch: Dispatch<'_>) -> bool {
    if !state.selection().is_empty() {
        return delete_selection(state, dispatch);
    }
    let Some(rpos) = cursor_pos(state) else {
        return false;
    };
    let parent = rpos.parent();
    if !parent.is_textblock() {
        return false;
    }
    if rpos.parent_offset() == parent.content().size() {
        return join_forward(state, dispatch);
    }
    let pos = rpos.pos();
    let mut tr = state.tr();
    if tr.delete(pos, pos + 1).is_err() {
        return false;
    }
    cursor_at(&mut tr, pos) && finish(tr, dispatch)
}

pub fn command(
    f: impl Fn(&EditorState, Option<&mut dyn FnMut(Transaction)>) -> bool + Send + Sync + 'static,
) -> Command {
    Arc::new(f)
}

/// Runs the commands in order until one applies.
pub fn chain_commands(commands: Vec<Command>) -> Command {
    command(move |state, mut dispatch| {
        commands
            .iter()
            .any(|cmd| cmd(state, reborrow(&mut dispatch)))
    })
}

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub run: Command,
}

impl CommandSpec {
    pub fn new(id: impl Into<String>, label: impl Into<String>, run: Command) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            run,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

pub fn core_commands() -> Vec<CommandSpec> {
    vec![
        CommandSpec::new("core.split_block", "Split block", command(split_block))
            .description("Split the current block at the cursor"),
        CommandSpec::new("core.join_backward", "Join backward", command(join_backward)),
        CommandSpec::new("core.join_forward", "Join forward", command(join_forward)),
        CommandSpec::new("core.delete_backward", "Delete backward", command(delete_backward)),
        CommandSpec::new("core.delete_forward", "Delete forward", command(delete_forward)),
        CommandSpec::new("core.delete_selection", "Delete selection", command(delete_selection)),
        CommandSpec::new("history.undo", "Undo", command(undo)),
        CommandSpec::new("history.redo", "Redo", command(redo)),
    ]
}

/// Key bindings such as `Enter`, `Backspace` or `Mod-Shift-z`.
#[derive(Clone, Default)]
pub struct Keymap {
    bindings: HashMap<String, Command>,
}

impl Keymap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, key: impl Into<String>, command: Command) -> Self {
        self.bindings.insert(key.into(), command);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Command> {
        self.bindings.get(key)
    }

    pub fn handle(&self, key: &str, state: &EditorState, dispatch: Dispatch<'_>) -> bool {
        match self.bindings.get(key) {
            Some(command) => command(state, dispatch),
            None => false,
        }
    }
}

impl fmt::Debug for Keymap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.bindings.keys().collect();
        keys.sort();
        f.debug_struct("Keymap").field("keys", &keys).finish()
    }
}

pub fn base_keymap() -> Keymap {
    Keymap::new()
        .bind("Enter", command(split_block))
        .bind("Backspace", command(delete_backward))
        .bind("Delete", command(delete_forward))
        .bind("Mod-z", command(undo))
        .bind("Mod-Shift-z", command(redo))
        .bind("Mod-y", command(redo))
}
