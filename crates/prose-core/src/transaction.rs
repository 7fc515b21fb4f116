use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::TransformError;
use crate::mapping::Mapping;
use crate::node::Node;
use crate::replace::Slice;
use crate::schema::Schema;
use crate::selection::{Selection, TextSelection};
use crate::step::{Step, StepResult};
use crate::transform::Transform;

pub const META_ADD_TO_HISTORY: &str = "addToHistory";
pub const META_APPENDED_TRANSACTION: &str = "appendedTransaction";
pub const META_HISTORY: &str = "history$";

/// A batch of steps plus the selection and metadata that go with them.
/// The selection is mapped through each step as it is added.
#[derive(Debug, Clone)]
pub struct Transaction {
    transform: Transform,
    schema: Schema,
    selection: Selection,
    selection_set: bool,
    meta: BTreeMap<String, Value>,
}

impl Transaction {
    pub(crate) fn new(schema: Schema, doc: Node, selection: Selection) -> Self {
        Self {
            transform: Transform::new(doc),
            schema,
            selection,
            selection_set: false,
            meta: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn before(&self) -> &Node {
        self.transform.before()
    }

    pub fn doc(&self) -> &Node {
        self.transform.doc()
    }

    pub fn steps(&self) -> &[Step] {
        self.transform.steps()
    }

    pub fn docs(&self) -> &[Node] {
        self.transform.docs()
    }

    pub fn mapping(&self) -> &Mapping {
        self.transform.mapping()
    }

    pub fn doc_changed(&self) -> bool {
        self.transform.doc_changed()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: impl Into<Selection>) -> &mut Self {
        self.selection = selection.into();
        self.selection_set = true;
        self
    }

    /// Whether the selection was set explicitly rather than mapped.
    pub fn selection_set(&self) -> bool {
        self.selection_set
    }

    fn track(
        &mut self,
        f: impl FnOnce(&mut Transform) -> Result<(), TransformError>,
    ) -> Result<&mut Self, TransformError> {
        let start = self.transform.steps().len();
        let result = f(&mut self.transform);
        if self.transform.steps().len() > start {
            let added = self.transform.mapping().slice(start);
            self.selection = self.selection.map(self.transform.doc(), &added);
        }
        result.map(|()| self)
    }

    pub fn step(&mut self, step: impl Into<Step>) -> Result<&mut Self, TransformError> {
        let step = step.into();
        self.track(|tr| tr.step(step).map(|_| ()))
    }

    pub fn maybe_step(&mut self, step: impl Into<Step>) -> StepResult {
        let step = step.into();
        let mut outcome = StepResult::Failed(String::new());
        let _ = self.track(|tr| {
            outcome = tr.maybe_step(step);
            Ok(())
        });
        outcome
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.delete(from, to).map(|_| ()))
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.replace(from, to, slice).map(|_| ()))
    }

    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: Vec<Node>,
    ) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.replace_with(from, to, content).map(|_| ()))
    }

    pub fn insert(&mut self, pos: usize, content: Vec<Node>) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.insert(pos, content).map(|_| ()))
    }

    pub fn split(&mut self, pos: usize, depth: usize) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.split(pos, depth).map(|_| ()))
    }

    pub fn join(&mut self, pos: usize, depth: usize) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.join(pos, depth).map(|_| ()))
    }

    pub fn set_node_attribute(
        &mut self,
        pos: usize,
        attr: &str,
        value: Value,
    ) -> Result<&mut Self, TransformError> {
        self.track(|tr| tr.set_node_attribute(pos, attr, value).map(|_| ()))
    }

    /// Deletes the selected range and leaves a cursor where it started.
    pub fn delete_selection(&mut self) -> Result<&mut Self, TransformError> {
        if self.selection.is_empty() {
            return Ok(self);
        }
        let from = self.selection.from();
        let to = self.selection.to();
        let size = self.doc().content().size();
        if from == 0 && to == size {
            // The whole document goes; keep the smallest valid content in its place.
            let filled = self
                .schema
                .create_and_fill(self.doc().node_type().name())
                .map_err(|err| TransformError::StepFailed(err.to_string()))?;
            self.replace(0, size, Slice::new(filled.content().clone(), 0, 0))?;
        } else {
            self.delete(from, to)?;
        }
        let doc = self.doc().clone();
        let rpos = doc.resolve(from.min(doc.content().size()))?;
        let selection = if rpos.parent().inline_content() {
            Selection::Text(TextSelection::cursor(&doc, rpos.pos())?)
        } else {
            Selection::near(&rpos, -1)
        };
        self.set_selection(selection);
        Ok(self)
    }

    /// Replaces `[from, to)` with `text`, keeping the marks of the text
    /// directly before `from`.
    pub fn insert_text(
        &mut self,
        text: &str,
        from: usize,
        to: usize,
    ) -> Result<&mut Self, TransformError> {
        if text.is_empty() {
            return self.delete(from, to);
        }
        let marks = self
            .doc()
            .resolve(from)?
            .node_before()
            .filter(Node::is_text)
            .map(|node| node.marks().to_vec())
            .unwrap_or_default();
        let node = self
            .schema
            .text(text, marks)
            .map_err(|err| TransformError::StepFailed(err.to_string()))?;
        self.replace_with(from, to, vec![node])
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn meta(&self) -> &BTreeMap<String, Value> {
        &self.meta
    }

    pub fn add_to_history(&self) -> bool {
        self.get_meta(META_ADD_TO_HISTORY) != Some(&Value::Bool(false))
    }

    pub fn set_add_to_history(&mut self, add: bool) -> &mut Self {
        self.set_meta(META_ADD_TO_HISTORY, add)
    }

    /// Set on transactions produced by a plugin's append hook.
    pub fn is_appended(&self) -> bool {
        self.get_meta(META_APPENDED_TRANSACTION) == Some(&Value::Bool(true))
    }
}
