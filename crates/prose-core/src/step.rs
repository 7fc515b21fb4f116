use serde_json::{Value, json};

use crate::error::{SchemaError, TransformError};
use crate::fragment::Fragment;
use crate::mapping::{Mappable, StepMap};
use crate::node::Node;
use crate::replace::Slice;
use crate::schema::Schema;

/// Outcome of applying a step. Failure leaves the document untouched.
#[must_use]
#[derive(Debug, Clone)]
pub enum StepResult {
    Ok(Node),
    Failed(String),
}

impl StepResult {
    fn from_replace(doc: &Node, from: usize, to: usize, slice: &Slice) -> Self {
        match doc.replace(from, to, slice) {
            Ok(doc) => StepResult::Ok(doc),
            Err(err) => StepResult::Failed(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, StepResult::Ok(_))
    }

    pub fn doc(&self) -> Option<&Node> {
        match self {
            StepResult::Ok(doc) => Some(doc),
            StepResult::Failed(_) => None,
        }
    }

    pub fn failed(&self) -> Option<&str> {
        match self {
            StepResult::Ok(_) => None,
            StepResult::Failed(reason) => Some(reason),
        }
    }
}

/// Replaces `[from, to)` with a slice. A `structure` step only moves node
/// boundaries and fails if the range holds any content.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceStep {
    pub from: usize,
    pub to: usize,
    pub slice: Slice,
    pub structure: bool,
}

impl ReplaceStep {
    pub fn new(from: usize, to: usize, slice: Slice, structure: bool) -> Self {
        Self {
            from,
            to,
            slice,
            structure,
        }
    }

    fn apply(&self, doc: &Node) -> StepResult {
        if self.from > self.to {
            return StepResult::Failed(format!(
                "Replace range {}..{} is reversed",
                self.from, self.to
            ));
        }
        if self.structure && content_between(doc, self.from, self.to) {
            return StepResult::Failed("Structure replace would overwrite content".into());
        }
        StepResult::from_replace(doc, self.from, self.to, &self.slice)
    }

    fn get_map(&self) -> StepMap {
        StepMap::new([(
            self.from,
            self.to.saturating_sub(self.from),
            self.slice.size(),
        )])
    }

    fn invert(&self, doc: &Node) -> Result<ReplaceStep, TransformError> {
        if self.from > self.to {
            return Err(TransformError::StepFailed(format!(
                "Replace range {}..{} is reversed",
                self.from, self.to
            )));
        }
        Ok(ReplaceStep::new(
            self.from,
            self.from + self.slice.size(),
            doc.slice(self.from, self.to)?,
            false,
        ))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<ReplaceStep> {
        let from = mapping.map_result(self.from, 1);
        let to = mapping.map_result(self.to, -1);
        if from.deleted_across && to.deleted_across {
            return None;
        }
        Some(ReplaceStep::new(
            from.pos,
            from.pos.max(to.pos),
            self.slice.clone(),
            self.structure,
        ))
    }
}

fn content_between(doc: &Node, from: usize, to: usize) -> bool {
    let Ok(rfrom) = doc.resolve(from) else {
        return true;
    };
    let mut dist = to.saturating_sub(from);
    let mut depth = rfrom.depth();
    while dist > 0 && depth > 0 && rfrom.index_after(depth) == rfrom.node(depth).child_count() {
        depth -= 1;
        dist -= 1;
    }
    if dist > 0 {
        let mut next = rfrom.node(depth).maybe_child(rfrom.index_after(depth));
        while dist > 0 {
            match next {
                Some(node) if !node.is_leaf() => next = node.first_child(),
                _ => return true,
            }
            dist -= 1;
        }
    }
    false
}

/// Sets one attribute on the node starting at `pos`. Positions do not move.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrStep {
    pub pos: usize,
    pub attr: String,
    pub value: Value,
}

impl AttrStep {
    pub fn new(pos: usize, attr: impl Into<String>, value: Value) -> Self {
        Self {
            pos,
            attr: attr.into(),
            value,
        }
    }

    fn apply(&self, doc: &Node) -> StepResult {
        let Some(node) = doc.node_at(self.pos) else {
            return StepResult::Failed("No node at attribute step's position".into());
        };
        if node.is_text() {
            return StepResult::Failed("Attribute steps cannot target text".into());
        }
        if !node.node_type().has_attr(&self.attr) {
            return StepResult::Failed(format!(
                "Node type {} has no attribute {}",
                node.node_type().name(),
                self.attr
            ));
        }
        // The replacement is an empty shell; the replace joins the old content back in.
        let updated = node
            .with_attr(&self.attr, self.value.clone())
            .copy(Fragment::empty());
        let open_end = if node.is_leaf() { 0 } else { 1 };
        StepResult::from_replace(
            doc,
            self.pos,
            self.pos + 1,
            &Slice::new(Fragment::from_node(updated), 0, open_end),
        )
    }

    fn invert(&self, doc: &Node) -> Result<AttrStep, TransformError> {
        let node = doc
            .node_at(self.pos)
            .ok_or_else(|| TransformError::StepFailed(format!("No node at {}", self.pos)))?;
        let old = node.attr(&self.attr).cloned().unwrap_or(Value::Null);
        Ok(AttrStep::new(self.pos, self.attr.clone(), old))
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<AttrStep> {
        let pos = mapping.map_result(self.pos, 1);
        if pos.deleted_after {
            None
        } else {
            Some(AttrStep::new(pos.pos, self.attr.clone(), self.value.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Replace(ReplaceStep),
    Attr(AttrStep),
}

impl Step {
    pub fn apply(&self, doc: &Node) -> StepResult {
        match self {
            Step::Replace(step) => step.apply(doc),
            Step::Attr(step) => step.apply(doc),
        }
    }

    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace(step) => step.get_map(),
            Step::Attr(_) => StepMap::empty(),
        }
    }

    /// The step that undoes this one, given the document it was applied to.
    pub fn invert(&self, doc: &Node) -> Result<Step, TransformError> {
        match self {
            Step::Replace(step) => step.invert(doc).map(Step::Replace),
            Step::Attr(step) => step.invert(doc).map(Step::Attr),
        }
    }

    /// Rebases the step over `mapping`. `None` when its target was deleted.
    pub fn map(&self, mapping: &dyn Mappable) -> Option<Step> {
        match self {
            Step::Replace(step) => step.map(mapping).map(Step::Replace),
            Step::Attr(step) => step.map(mapping).map(Step::Attr),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Step::Replace(step) => {
                let mut value = json!({
                    "stepType": "replace",
                    "from": step.from,
                    "to": step.to,
                });
                if step.slice.content.size() > 0 {
                    value["slice"] = step.slice.to_json();
                }
                if step.structure {
                    value["structure"] = Value::Bool(true);
                }
                value
            }
            Step::Attr(step) => json!({
                "stepType": "attr",
                "pos": step.pos,
                "attr": step.attr,
                "value": step.value,
            }),
        }
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Step, SchemaError> {
        let pos_field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .ok_or_else(|| SchemaError::Json(format!("step is missing `{name}`")))
        };
        match value.get("stepType").and_then(Value::as_str) {
            Some("replace") => {
                let slice = match value.get("slice") {
                    Some(slice) => Slice::from_json(schema, slice)?,
                    None => Slice::empty(),
                };
                let structure = value
                    .get("structure")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(Step::Replace(ReplaceStep::new(
                    pos_field("from")?,
                    pos_field("to")?,
                    slice,
                    structure,
                )))
            }
            Some("attr") => {
                let attr = value
                    .get("attr")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SchemaError::Json("attr step is missing `attr`".into()))?;
                Ok(Step::Attr(AttrStep::new(
                    pos_field("pos")?,
                    attr,
                    value.get("value").cloned().unwrap_or(Value::Null),
                )))
            }
            Some(other) => Err(SchemaError::Json(format!("unknown step type `{other}`"))),
            None => Err(SchemaError::Json("step is missing `stepType`".into())),
        }
    }
}

impl From<ReplaceStep> for Step {
    fn from(step: ReplaceStep) -> Self {
        Step::Replace(step)
    }
}

impl From<AttrStep> for Step {
    fn from(step: AttrStep) -> Self {
        Step::Attr(step)
    }
}
