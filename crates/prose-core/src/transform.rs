use serde_json::Value;

use crate::error::TransformError;
use crate::fragment::Fragment;
use crate::mapping::Mapping;
use crate::node::Node;
use crate::replace::Slice;
use crate::resolved::ResolvedPos;
use crate::step::{AttrStep, ReplaceStep, Step, StepResult};

/// Accumulates steps against a document, tracking every intermediate
/// document and the combined position mapping.
#[derive(Debug, Clone)]
pub struct Transform {
    before: Node,
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
}

impl Transform {
    pub fn new(doc: Node) -> Self {
        Self {
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
        }
    }

    pub fn before(&self) -> &Node {
        &self.before
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The document before each step, parallel to `steps`.
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn step(&mut self, step: impl Into<Step>) -> Result<&mut Self, TransformError> {
        match self.maybe_step(step) {
            StepResult::Ok(_) => Ok(self),
            StepResult::Failed(reason) => Err(TransformError::StepFailed(reason)),
        }
    }

    /// Applies the step if it can be applied; a failed step changes nothing.
    pub fn maybe_step(&mut self, step: impl Into<Step>) -> StepResult {
        let step = step.into();
        let result = step.apply(&self.doc);
        match &result {
            StepResult::Ok(doc) => {
                tracing::trace!(?step, "step applied");
                let before = std::mem::replace(&mut self.doc, doc.clone());
                self.docs.push(before);
                self.mapping.append_map(step.get_map());
                self.steps.push(step);
            }
            StepResult::Failed(reason) => {
                tracing::trace!(?step, %reason, "step rejected");
            }
        }
        result
    }

    /// Deletes `[from, to)`, joining the nodes on either side of the gap.
    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        if from == to {
            return Ok(self);
        }
        let rfrom = self.doc.resolve(from)?;
        let rto = self.doc.resolve(to)?;
        if rfrom.depth() == rto.depth() {
            return self.step(ReplaceStep::new(from, to, Slice::empty(), false));
        }
        let (start, end, slice) = joined_deletion(&rfrom, &rto)?;
        self.step(ReplaceStep::new(start, end, slice, false))
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, TransformError> {
        if from == to && slice.content.size() == 0 {
            return Ok(self);
        }
        self.step(ReplaceStep::new(from, to, slice, false))
    }

    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: Vec<Node>,
    ) -> Result<&mut Self, TransformError> {
        self.replace(from, to, Slice::new(Fragment::from_nodes(content), 0, 0))
    }

    pub fn insert(&mut self, pos: usize, content: Vec<Node>) -> Result<&mut Self, TransformError> {
        self.replace_with(pos, pos, content)
    }

    /// Splits the `depth` innermost ancestors of `pos` in two. Each new node
    /// after the split copies the type and attributes of the original.
    pub fn split(&mut self, pos: usize, depth: usize) -> Result<&mut Self, TransformError> {
        let rpos = self.doc.resolve(pos)?;
        if depth == 0 || depth > rpos.depth() {
            return Err(TransformError::StepFailed(format!(
                "cannot split {depth} levels at depth {}",
                rpos.depth()
            )));
        }
        let mut before = Fragment::empty();
        let mut after = Fragment::empty();
        for d in (rpos.depth() - depth + 1..=rpos.depth()).rev() {
            before = Fragment::from_node(rpos.node(d).copy(before));
            after = Fragment::from_node(rpos.node(d).copy(after));
        }
        self.step(ReplaceStep::new(
            pos,
            pos,
            Slice::new(before.append(&after), depth, depth),
            true,
        ))
    }

    /// Joins the nodes around the boundary at `pos`, `depth` levels deep.
    pub fn join(&mut self, pos: usize, depth: usize) -> Result<&mut Self, TransformError> {
        if pos < depth {
            return Err(TransformError::StepFailed(format!("no boundary at {pos}")));
        }
        self.step(ReplaceStep::new(pos - depth, pos + depth, Slice::empty(), true))
    }

    pub fn set_node_attribute(
        &mut self,
        pos: usize,
        attr: &str,
        value: Value,
    ) -> Result<&mut Self, TransformError> {
        self.step(AttrStep::new(pos, attr, value))
    }
}

/// Builds a replacement for deleting `[from, to)` when the two ends sit at
/// different depths. The innermost nodes at each end are merged level by level,
/// and leftovers from the deeper side stay wrapped in their own ancestors.
fn joined_deletion(
    from: &ResolvedPos,
    to: &ResolvedPos,
) -> Result<(usize, usize, Slice), TransformError> {
    let shared = from.shared_depth(to.pos());
    let (a, b) = (from.depth(), to.depth());
    if a <= shared || b <= shared {
        return Err(TransformError::StepFailed(format!(
            "cannot delete {}..{} across depths {a} and {b}",
            from.pos(),
            to.pos()
        )));
    }
    let checked = |node: &Node, children: Vec<Node>| -> Result<Node, TransformError> {
        let content = Fragment::from_nodes(children);
        node.node_type()
            .check_content(&content)
            .map_err(|err| TransformError::StepFailed(err.to_string()))?;
        Ok(node.copy(content))
    };

    let pairs = (a - shared).min(b - shared);
    let mut top: Option<Node> = None;
    for i in 0..pairs {
        let fnode = from.node(a - i);
        let tnode = to.node(b - i);
        let mut children: Vec<Node> = Vec::new();
        if i == 0 {
            children.extend(fnode.content().cut(0, from.parent_offset()).iter().cloned());
            children.extend(
                tnode
                    .content()
                    .cut(to.parent_offset(), tnode.content().size())
                    .iter()
                    .cloned(),
            );
        } else {
            children.extend(fnode.content().iter().take(from.index(a - i)).cloned());
            children.extend(top.take());
            children.extend(tnode.content().iter().skip(to.index(b - i) + 1).cloned());
        }
        top = Some(checked(fnode, children)?);
    }

    for depth in (shared + 1..=a - pairs).rev() {
        let fnode = from.node(depth);
        let mut children: Vec<Node> = fnode
            .content()
            .iter()
            .take(from.index(depth))
            .cloned()
            .collect();
        children.extend(top.take());
        top = Some(checked(fnode, children)?);
    }

    let mut leftover: Option<Node> = None;
    for depth in (shared + 1..=b - pairs).rev() {
        let tnode = to.node(depth);
        let mut children: Vec<Node> = leftover.take().into_iter().collect();
        children.extend(tnode.content().iter().skip(to.index(depth) + 1).cloned());
        if !children.is_empty() {
            leftover = Some(checked(tnode, children)?);
        }
    }

    let content: Vec<Node> = top.into_iter().chain(leftover).collect();
    Ok((
        from.before(shared + 1),
        to.after(shared + 1),
        Slice::new(Fragment::from_nodes(content), 0, 0),
    ))
}
