use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plugin::{Plugin, PluginKey, PluginState};
use crate::selection::Selection;
use crate::state::EditorState;
use crate::step::Step;
use crate::transaction::{META_HISTORY, Transaction};

pub const HISTORY: PluginKey<HistoryState> = PluginKey::new("history");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Undo items kept before the oldest is dropped.
    pub depth: usize,
}

impl HistoryConfig {
    fn with_defaults(mut self) -> Self {
        if self.depth == 0 {
            self.depth = 200;
        }
        self
    }
}

/// One undoable change: the steps that revert it, in application order, and
/// the selection to restore.
#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub steps: Vec<Step>,
    pub selection: Selection,
}

impl HistoryItem {
    fn inverting(tr: &Transaction, selection: Selection) -> Option<Self> {
        let mut steps = Vec::with_capacity(tr.steps().len());
        for (step, doc) in tr.steps().iter().zip(tr.docs()).rev() {
            match step.invert(doc) {
                Ok(inverted) => steps.push(inverted),
                Err(err) => {
                    tracing::warn!(%err, "step could not be inverted; change not recorded");
                    return None;
                }
            }
        }
        Some(Self { steps, selection })
    }

    fn map(&self, tr: &Transaction) -> Option<Self> {
        let steps: Vec<Step> = self
            .steps
            .iter()
            .filter_map(|step| step.map(tr.mapping()))
            .collect();
        if steps.is_empty() {
            return None;
        }
        Some(Self {
            steps,
            selection: self.selection.map(tr.doc(), tr.mapping()),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    pub done: Vec<HistoryItem>,
    pub undone: Vec<HistoryItem>,
}

impl HistoryState {
    fn push_done(&mut self, item: HistoryItem, depth: usize) {
        self.done.push(item);
        if self.done.len() > depth {
            let overflow = self.done.len() - depth;
            self.done.drain(..overflow);
        }
    }
}

pub struct HistoryPlugin {
    config: HistoryConfig,
}

pub fn history(config: HistoryConfig) -> HistoryPlugin {
    HistoryPlugin {
        config: config.with_defaults(),
    }
}

impl HistoryPlugin {
    fn next_state(&self, tr: &Transaction, prev: &HistoryState, old: &EditorState) -> HistoryState {
        let mut next = prev.clone();
        match tr.get_meta(META_HISTORY).and_then(Value::as_str) {
            Some("undo") => {
                next.done.pop();
                if let Some(item) = HistoryItem::inverting(tr, old.selection().clone()) {
                    next.undone.push(item);
                }
            }
            Some("redo") => {
                next.undone.pop();
                if let Some(item) = HistoryItem::inverting(tr, old.selection().clone()) {
                    next.push_done(item, self.config.depth);
                }
            }
            _ if !tr.doc_changed() => {}
            _ if tr.add_to_history() => {
                let Some(mut item) = HistoryItem::inverting(tr, old.selection().clone()) else {
                    return next;
                };
                match next.done.last_mut() {
                    // Appended corrections revert together with the change that caused them.
                    Some(last) if tr.is_appended() => {
                        item.steps.append(&mut last.steps);
                        last.steps = item.steps;
                    }
                    _ => next.push_done(item, self.config.depth),
                }
                next.undone.clear();
            }
            _ => {
                next.done = next.done.iter().filter_map(|item| item.map(tr)).collect();
                next.undone = next.undone.iter().filter_map(|item| item.map(tr)).collect();
            }
        }
        next
    }
}

impl Plugin for HistoryPlugin {
    fn key(&self) -> &str {
        HISTORY.name()
    }

    fn init(&self, _state: &EditorState) -> Option<PluginState> {
        Some(Arc::new(HistoryState::default()))
    }

    fn apply(
        &self,
        tr: &Transaction,
        value: &PluginState,
        old: &EditorState,
        _new: &EditorState,
    ) -> PluginState {
        match value.downcast_ref::<HistoryState>() {
            Some(prev) => Arc::new(self.next_state(tr, prev, old)),
            None => value.clone(),
        }
    }
}

pub fn undo_depth(state: &EditorState) -> usize {
    HISTORY.get(state).map_or(0, |h| h.done.len())
}

pub fn redo_depth(state: &EditorState) -> usize {
    HISTORY.get(state).map_or(0, |h| h.undone.len())
}

fn replay(
    state: &EditorState,
    item: &HistoryItem,
    direction: &str,
    dispatch: Option<&mut dyn FnMut(Transaction)>,
) -> bool {
    let Some(dispatch) = dispatch else {
        return true;
    };
    let mut tr = state.tr();
    for step in &item.steps {
        if let Some(reason) = tr.maybe_step(step.clone()).failed() {
            tracing::debug!(direction, %reason, "history step no longer applies; skipping");
        }
    }
    let doc = tr.doc().clone();
    let selection = match item.selection.validate(&doc) {
        Ok(()) => item.selection.clone(),
        Err(_) => match doc.resolve(item.selection.head().min(doc.content().size())) {
            Ok(pos) => Selection::near(&pos, 1),
            Err(_) => Selection::at_start(&doc),
        },
    };
    tr.set_selection(selection);
    tr.set_meta(META_HISTORY, direction);
    dispatch(tr);
    true
}

pub fn undo(state: &EditorState, dispatch: Option<&mut dyn FnMut(Transaction)>) -> bool {
    match HISTORY.get(state).and_then(|h| h.done.last()) {
        Some(item) => replay(state, item, "undo", dispatch),
        None => false,
    }
}

pub fn redo(state: &EditorState, dispatch: Option<&mut dyn FnMut(Transaction)>) -> bool {
    match HISTORY.get(state).and_then(|h| h.undone.last()) {
        Some(item) => replay(state, item, "redo", dispatch),
        None => false,
    }
}
