use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{PositionError, ReplaceError};
use crate::fragment::Fragment;
use crate::replace::{Slice, replace};
use crate::resolved::ResolvedPos;
use crate::schema::{Attrs, MarkType, NodeType};

#[derive(Clone, PartialEq)]
pub struct Mark {
    mark_type: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub(crate) fn new(mark_type: MarkType, attrs: Attrs) -> Self {
        Self { mark_type, attrs }
    }

    pub fn mark_type(&self) -> &MarkType {
        &self.mark_type
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub(crate) fn sort_set(mut marks: Vec<Mark>) -> Vec<Mark> {
        marks.sort_by_key(|m| m.mark_type.rank());
        marks.dedup_by(|a, b| a.mark_type == b.mark_type);
        marks
    }
}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mark_type.name())
    }
}

struct NodeData {
    node_type: NodeType,
    attrs: Attrs,
    content: Fragment,
    marks: Vec<Mark>,
    text: Option<String>,
    size: usize,
}

/// An immutable node in the document tree. Cloning is a reference-count bump;
/// edits build new nodes that share every unchanged child.
#[derive(Clone)]
pub struct Node(Arc<NodeData>);

impl Node {
    pub(crate) fn element(
        node_type: NodeType,
        attrs: Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Self {
        let size = if node_type.is_leaf() {
            1
        } else {
            content.size() + 2
        };
        Node(Arc::new(NodeData {
            node_type,
            attrs,
            content,
            marks,
            text: None,
            size,
        }))
    }

    pub(crate) fn text_node(node_type: NodeType, text: String, marks: Vec<Mark>) -> Self {
        let size = text.chars().count();
        Node(Arc::new(NodeData {
            node_type,
            attrs: Attrs::new(),
            content: Fragment::empty(),
            marks,
            text: Some(text),
            size,
        }))
    }

    pub fn node_type(&self) -> &NodeType {
        &self.0.node_type
    }

    pub fn attrs(&self) -> &Attrs {
        &self.0.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.0.attrs.get(name)
    }

    pub fn content(&self) -> &Fragment {
        &self.0.content
    }

    pub fn marks(&self) -> &[Mark] {
        &self.0.marks
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text.as_deref()
    }

    pub fn node_size(&self) -> usize {
        self.0.size
    }

    pub fn child_count(&self) -> usize {
        self.0.content.child_count()
    }

    pub fn child(&self, index: usize) -> &Node {
        self.0.content.child(index)
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.0.content.maybe_child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.0.content.first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.0.content.last_child()
    }

    pub fn is_text(&self) -> bool {
        self.0.text.is_some()
    }

    pub fn is_inline(&self) -> bool {
        self.0.node_type.is_inline()
    }

    pub fn is_block(&self) -> bool {
        self.0.node_type.is_block()
    }

    pub fn is_textblock(&self) -> bool {
        self.0.node_type.is_textblock()
    }

    pub fn inline_content(&self) -> bool {
        self.0.node_type.inline_content()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.node_type.is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.0.node_type.is_atom()
    }

    pub fn ptr_eq(&self, other: &Node) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn same_markup(&self, other: &Node) -> bool {
        self.0.node_type == other.0.node_type
            && self.0.attrs == other.0.attrs
            && self.0.marks == other.0.marks
    }

    /// Same type, attributes and marks with new content. The caller is
    /// responsible for the content being valid.
    pub fn copy(&self, content: Fragment) -> Node {
        if content.ptr_eq(&self.0.content) {
            return self.clone();
        }
        Node::element(
            self.0.node_type.clone(),
            self.0.attrs.clone(),
            content,
            self.0.marks.clone(),
        )
    }

    pub fn with_text(&self, text: String) -> Node {
        Node::text_node(self.0.node_type.clone(), text, self.0.marks.clone())
    }

    pub fn with_attr(&self, name: &str, value: Value) -> Node {
        let mut attrs = self.0.attrs.clone();
        attrs.insert(name.to_string(), value);
        Node(Arc::new(NodeData {
            node_type: self.0.node_type.clone(),
            attrs,
            content: self.0.content.clone(),
            marks: self.0.marks.clone(),
            text: self.0.text.clone(),
            size: self.0.size,
        }))
    }

    /// Cuts the node down to the given range of its content (characters for
    /// text nodes).
    pub fn cut(&self, from: usize, to: usize) -> Node {
        if let Some(text) = &self.0.text {
            let to = to.min(self.0.size);
            if from == 0 && to == self.0.size {
                return self.clone();
            }
            return self.with_text(char_slice(text, from, to).to_string());
        }
        let to = to.min(self.0.content.size());
        if from == 0 && to == self.0.content.size() {
            return self.clone();
        }
        self.copy(self.0.content.cut(from, to))
    }

    pub fn text_content(&self) -> String {
        if let Some(text) = &self.0.text {
            return text.clone();
        }
        self.0.content.text_between(0, self.0.content.size(), "")
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: &str) -> String {
        self.0.content.text_between(from, to, block_separator)
    }

    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, PositionError> {
        ResolvedPos::resolve(self, pos)
    }

    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, PositionError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(rfrom.pos() - start, rto.pos() - start);
        Ok(Slice::new(
            content,
            rfrom.depth() - depth,
            rto.depth() - depth,
        ))
    }

    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ReplaceError> {
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        replace(&rfrom, &rto, slice)
    }

    /// The node starting at `pos`, if any.
    pub fn node_at(&self, mut pos: usize) -> Option<&Node> {
        let mut node = self;
        loop {
            let (index, offset) = node.content().find_index(pos).ok()?;
            node = node.maybe_child(index)?;
            if offset == pos || node.is_text() {
                return Some(node);
            }
            pos -= offset + 1;
        }
    }

    /// Calls `f` for every descendant overlapping `[from, to)`. Returning
    /// `false` skips the node's children.
    pub fn nodes_between(
        &self,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(&Node, usize, &Node, usize) -> bool,
    ) {
        self.0.content.nodes_between(from, to, f, 0, self);
    }

    pub fn descendants(&self, f: &mut dyn FnMut(&Node, usize, &Node, usize) -> bool) {
        self.nodes_between(0, self.0.content.size(), f);
    }

    fn write_debug(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = &self.0.text {
            for mark in &self.0.marks {
                write!(out, "{}(", mark.mark_type().name())?;
            }
            write!(out, "{text:?}")?;
            for _ in &self.0.marks {
                out.write_str(")")?;
            }
            return Ok(());
        }
        out.write_str(self.0.node_type.name())?;
        if self.0.content.child_count() > 0 {
            out.write_str("(")?;
            for (ix, child) in self.0.content.iter().enumerate() {
                if ix > 0 {
                    out.write_str(", ")?;
                }
                child.write_debug(out)?;
            }
            out.write_str(")")?;
        }
        Ok(())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.same_markup(other)
                && self.0.text == other.0.text
                && self.0.content == other.0.content)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_debug(f)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_debug(f)
    }
}

pub(crate) fn char_slice(text: &str, from: usize, to: usize) -> &str {
    let mut indices = text.char_indices().map(|(ix, _)| ix).chain([text.len()]);
    let start = indices.nth(from).unwrap_or(text.len());
    let end = if to > from {
        indices.nth(to - from - 1).unwrap_or(text.len())
    } else {
        start
    };
    &text[start..end]
}

#[cfg(test)]
mod tests {
    use super::char_slice;

    #[test]
    fn char_slice_counts_chars_not_bytes() {
        assert_eq!(char_slice("héllo", 1, 3), "él");
        assert_eq!(char_slice("héllo", 0, 5), "héllo");
        assert_eq!(char_slice("héllo", 5, 5), "");
        assert_eq!(char_slice("abc", 2, 10), "c");
    }
}
