use std::fmt;
use std::sync::Arc;

use crate::error::PositionError;
use crate::node::{Node, char_slice};

/// An immutable run of sibling nodes with its total size cached.
#[derive(Clone)]
pub struct Fragment {
    nodes: Arc<[Node]>,
    size: usize,
}

impl Fragment {
    pub fn empty() -> Self {
        Self {
            nodes: Arc::from(Vec::new()),
            size: 0,
        }
    }

    /// Builds a fragment, joining adjacent text nodes that carry the same marks.
    pub fn from_nodes(nodes: Vec<Node>) -> Self {
        let mut joined: Vec<Node> = Vec::with_capacity(nodes.len());
        for node in nodes {
            push_joining_text(&mut joined, node);
        }
        Self::from_vec(joined)
    }

    pub fn from_node(node: Node) -> Self {
        Self::from_vec(vec![node])
    }

    fn from_vec(nodes: Vec<Node>) -> Self {
        let size = nodes.iter().map(Node::node_size).sum();
        Self {
            nodes: Arc::from(nodes),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn child_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn child(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.nodes.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn ptr_eq(&self, other: &Fragment) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
    }

    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        let to = to.min(self.size);
        if from == 0 && to == self.size {
            return self.clone();
        }
        let mut result = Vec::new();
        if to > from {
            let mut pos = 0;
            for child in self.nodes.iter() {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let piece = if pos < from || end > to {
                        if child.is_text() {
                            child.cut(from.saturating_sub(pos), (to - pos).min(child.node_size()))
                        } else {
                            child.cut(
                                from.saturating_sub(pos + 1),
                                (to - pos - 1).min(child.content().size()),
                            )
                        }
                    } else {
                        child.clone()
                    };
                    result.push(piece);
                }
                pos = end;
            }
        }
        Self::from_vec(result)
    }

    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.size == 0 && other.nodes.is_empty() {
            return self.clone();
        }
        if self.size == 0 && self.nodes.is_empty() {
            return other.clone();
        }
        let mut nodes: Vec<Node> = self.nodes.to_vec();
        let mut rest = other.nodes.iter();
        if let Some(first) = rest.next() {
            push_joining_text(&mut nodes, first.clone());
        }
        nodes.extend(rest.cloned());
        Self::from_vec(nodes)
    }

    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        if self.nodes[index].ptr_eq(&node) {
            return self.clone();
        }
        let mut nodes = self.nodes.to_vec();
        nodes[index] = node;
        Self::from_vec(nodes)
    }

    /// Index of the child containing `pos` and the offset at which that child
    /// starts. Positions on a child boundary resolve to the following child.
    pub fn find_index(&self, pos: usize) -> Result<(usize, usize), PositionError> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size {
            return Ok((self.nodes.len(), pos));
        }
        if pos > self.size {
            return Err(PositionError::OutOfRange {
                pos,
                size: self.size,
            });
        }
        let mut cur = 0;
        for (ix, child) in self.nodes.iter().enumerate() {
            let end = cur + child.node_size();
            if end >= pos {
                if end == pos {
                    return Ok((ix + 1, end));
                }
                return Ok((ix, cur));
            }
            cur = end;
        }
        Err(PositionError::OutOfRange {
            pos,
            size: self.size,
        })
    }

    pub(crate) fn nodes_between(
        &self,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(&Node, usize, &Node, usize) -> bool,
        node_start: usize,
        parent: &Node,
    ) {
        let mut pos = 0;
        for (ix, child) in self.nodes.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, ix) && child.content().size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    (to - start).min(child.content().size()),
                    f,
                    node_start + start,
                    child,
                );
            }
            pos = end;
        }
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: &str) -> String {
        let mut text = String::new();
        let mut first = true;
        let mut pos = 0;
        for child in self.nodes.iter() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from {
                collect_text(child, pos, from, to, block_separator, &mut first, &mut text);
            }
            pos = end;
        }
        text
    }
}

fn collect_text(
    node: &Node,
    pos: usize,
    from: usize,
    to: usize,
    block_separator: &str,
    first: &mut bool,
    out: &mut String,
) {
    if let Some(text) = node.text() {
        let start = from.saturating_sub(pos);
        let end = (to - pos).min(node.node_size());
        out.push_str(char_slice(text, start, end));
        return;
    }
    if node.is_block() && (node.is_textblock() || node.is_leaf()) && !block_separator.is_empty() {
        if *first {
            *first = false;
        } else {
            out.push_str(block_separator);
        }
    }
    let start = pos + 1;
    let mut child_pos = start;
    for child in node.content().iter() {
        if child_pos >= to {
            break;
        }
        let end = child_pos + child.node_size();
        if end > from {
            collect_text(child, child_pos, from, to, block_separator, first, out);
        }
        child_pos = end;
    }
}

fn push_joining_text(nodes: &mut Vec<Node>, node: Node) {
    if let (Some(last), Some(text)) = (nodes.last_mut(), node.text()) {
        if let Some(prev) = last.text() {
            if last.same_markup(&node) {
                let merged = format!("{prev}{text}");
                *last = last.with_text(merged);
                return;
            }
        }
    }
    nodes.push(node);
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || (self.size == other.size && self.nodes[..] == other.nodes[..])
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

impl Default for Fragment {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a Fragment {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

#[cfg(test)]
mod tests {
    use crate::schema::Schema;

    #[test]
    fn cut_keeps_partial_text_and_shares_whole_children() {
        let schema = Schema::basic();
        let a = schema
            .node("paragraph", None, vec![schema.text("hello", vec![]).unwrap()])
            .unwrap();
        let b = schema
            .node("paragraph", None, vec![schema.text("world", vec![]).unwrap()])
            .unwrap();
        let doc = schema.node("doc", None, vec![a.clone(), b.clone()]).unwrap();

        let cut = doc.content().cut(3, 10);
        assert_eq!(cut.child_count(), 2);
        assert_eq!(cut.child(0).text_content(), "llo");
        assert_eq!(cut.child(1).text_content(), "wo");

        let whole = doc.content().cut(0, 7);
        assert!(whole.child(0).ptr_eq(&a));
    }

    #[test]
    fn find_index_resolves_boundaries_to_next_child() {
        let schema = Schema::basic();
        let p = schema
            .node("paragraph", None, vec![schema.text("ab", vec![]).unwrap()])
            .unwrap();
        let doc = schema.node("doc", None, vec![p.clone(), p]).unwrap();
        assert_eq!(doc.content().find_index(0).unwrap(), (0, 0));
        assert_eq!(doc.content().find_index(2).unwrap(), (0, 0));
        assert_eq!(doc.content().find_index(4).unwrap(), (1, 4));
        assert_eq!(doc.content().find_index(8).unwrap(), (2, 8));
        assert!(doc.content().find_index(9).is_err());
    }

    #[test]
    fn from_nodes_joins_text_with_equal_marks() {
        let schema = Schema::basic();
        let strong = schema.mark("strong", None).unwrap();
        let fragment = super::Fragment::from_nodes(vec![
            schema.text("ab", vec![]).unwrap(),
            schema.text("cd", vec![]).unwrap(),
            schema.text("ef", vec![strong]).unwrap(),
        ]);
        assert_eq!(fragment.child_count(), 2);
        assert_eq!(fragment.child(0).text(), Some("abcd"));
        assert_eq!(fragment.size(), 6);
    }

    #[test]
    fn text_between_separates_blocks() {
        let schema = Schema::basic();
        let p = |t: &str| {
            schema
                .node("paragraph", None, vec![schema.text(t, vec![]).unwrap()])
                .unwrap()
        };
        let doc = schema.node("doc", None, vec![p("hello"), p("world")]).unwrap();
        assert_eq!(doc.text_between(0, doc.content().size(), "\n"), "hello\nworld");
        assert_eq!(doc.text_between(4, 10, "|"), "lo|wo");
    }
}
