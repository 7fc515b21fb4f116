use std::fmt;

use crate::error::PositionError;
use crate::node::Node;

#[derive(Clone)]
struct PathEntry {
    node: Node,
    index: usize,
    offset: usize,
}

/// A position decoded into its ancestor chain. Depth 0 is the document.
#[derive(Clone)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<PathEntry>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub fn resolve(doc: &Node, pos: usize) -> Result<Self, PositionError> {
        let size = doc.content().size();
        if pos > size {
            return Err(PositionError::OutOfRange { pos, size });
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset)?;
            let rem = parent_offset - offset;
            path.push(PathEntry {
                node: node.clone(),
                index,
                offset: start + offset,
            });
            if rem == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            parent_offset = rem - 1;
            start += offset + 1;
            node = child;
        }
        Ok(Self {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    pub fn doc(&self) -> &Node {
        &self.path[0].node
    }

    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].node
    }

    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].index
    }

    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth() && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// Position at the start of the content of the node at `depth`.
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].offset + 1
        }
    }

    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content().size()
    }

    /// Position directly before the node at `depth`. The document has no
    /// position before it, so `depth` must be at least 1.
    pub fn before(&self, depth: usize) -> usize {
        debug_assert!(depth > 0, "there is no position before the top-level node");
        if depth == self.depth() + 1 {
            return self.pos;
        }
        self.path[depth - 1].offset
    }

    /// Position directly after the node at `depth`, which must be at least 1.
    pub fn after(&self, depth: usize) -> usize {
        debug_assert!(depth > 0, "there is no position after the top-level node");
        if depth == self.depth() + 1 {
            return self.pos;
        }
        self.path[depth - 1].offset + self.node(depth).node_size()
    }

    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// Offset into the text node the position points into, 0 between nodes.
    pub fn text_offset(&self) -> usize {
        self.pos - self.path[self.depth()].offset
    }

    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if index == parent.child_count() {
            return None;
        }
        let d_off = self.text_offset();
        let child = parent.child(index);
        if d_off > 0 {
            Some(child.cut(d_off, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let d_off = self.text_offset();
        if d_off > 0 {
            return Some(self.parent().child(index).cut(0, d_off));
        }
        if index == 0 {
            None
        } else {
            Some(self.parent().child(index - 1).clone())
        }
    }

    /// Deepest depth whose node contains both this position and `pos`.
    pub fn shared_depth(&self, pos: usize) -> usize {
        (1..=self.depth())
            .rev()
            .find(|&depth| self.start(depth) <= pos && self.end(depth) >= pos)
            .unwrap_or(0)
    }

    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }
}

impl fmt::Debug for ResolvedPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut path = String::new();
        for depth in 1..=self.depth() {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(&format!(
                "{}_{}",
                self.node(depth).node_type().name(),
                self.index(depth - 1)
            ));
        }
        write!(f, "{path}:{}", self.parent_offset)
    }
}

impl PartialEq for ResolvedPos {
    fn eq(&self, other: &Self) -> bool {
        self.pos == other.pos && self.doc().ptr_eq(other.doc())
    }
}
