use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::PluginError;
use crate::plugin::Plugin;
use crate::schema::ID_ATTR;
use crate::state::EditorState;
use crate::transaction::Transaction;

pub const NODE_ID_KEY: &str = "node_id";

/// Source of fresh node identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns an id not contained in `taken`.
    fn next_id(&self, taken: &HashSet<String>) -> String;
}

/// `<prefix><n>` with a monotonically increasing `n`, skipping ids already in
/// the document.
pub struct CounterIds {
    prefix: String,
    next: AtomicU64,
}

impl CounterIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for CounterIds {
    fn default() -> Self {
        Self::new("p-")
    }
}

impl IdGenerator for CounterIds {
    fn next_id(&self, taken: &HashSet<String>) -> String {
        loop {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let id = format!("{}{n}", self.prefix);
            if !taken.contains(&id) {
                return id;
            }
        }
    }
}

/// Keeps the `id` attribute of every node that declares one present and
/// unique. Corrections are appended as a separate transaction that stays out
/// of the undo history.
pub struct NodeIdPlugin {
    ids: Box<dyn IdGenerator>,
}

impl NodeIdPlugin {
    pub fn new() -> Self {
        Self::with_generator(CounterIds::default())
    }

    pub fn with_generator(ids: impl IdGenerator + 'static) -> Self {
        Self { ids: Box::new(ids) }
    }

    /// Builds the transaction assigning ids to nodes in `state` that lack one
    /// or repeat an earlier node's id. `None` when every id is fine.
    pub fn ensure_ids(&self, state: &EditorState) -> Result<Option<Transaction>, PluginError> {
        let mut taken: HashSet<String> = HashSet::new();
        let mut missing: Vec<usize> = Vec::new();
        state.doc().descendants(&mut |node, pos, _, _| {
            if node.node_type().has_attr(ID_ATTR) {
                match node.attr(ID_ATTR) {
                    Some(Value::String(id)) if !id.is_empty() && !taken.contains(id) => {
                        taken.insert(id.clone());
                    }
                    _ => missing.push(pos),
                }
            }
            !node.is_textblock()
        });
        if missing.is_empty() {
            return Ok(None);
        }

        let mut tr = state.tr();
        for pos in missing {
            let id = self.ids.next_id(&taken);
            taken.insert(id.clone());
            tr.set_node_attribute(pos, ID_ATTR, Value::String(id))
                .map_err(|err| PluginError::new(NODE_ID_KEY, err.to_string()))?;
        }
        tr.set_add_to_history(false);
        tracing::debug!(assigned = tr.steps().len(), "assigning node ids");
        Ok(Some(tr))
    }
}

impl Default for NodeIdPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for NodeIdPlugin {
    fn key(&self) -> &str {
        NODE_ID_KEY
    }

    fn append_transaction(
        &self,
        trs: &[Transaction],
        _old: &EditorState,
        new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError> {
        if !trs.iter().any(Transaction::doc_changed) {
            return Ok(None);
        }
        self.ensure_ids(new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_skips_taken_ids() {
        let ids = CounterIds::default();
        let taken: HashSet<String> = ["p-1".to_string(), "p-2".to_string()].into();
        assert_eq!(ids.next_id(&taken), "p-3");
        assert_eq!(ids.next_id(&taken), "p-4");
    }
}
