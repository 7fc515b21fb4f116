use serde_json::{Value, json};

use crate::error::{PositionError, SelectionError};
use crate::mapping::Mappable;
use crate::node::Node;
use crate::resolved::ResolvedPos;

/// A cursor or a range of inline content. `anchor` stays put while `head`
/// moves when the selection is extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSelection {
    anchor: usize,
    head: usize,
}

impl TextSelection {
    pub fn create(doc: &Node, anchor: usize, head: usize) -> Result<Self, PositionError> {
        doc.resolve(anchor)?;
        doc.resolve(head)?;
        Ok(Self { anchor, head })
    }

    pub fn cursor(doc: &Node, pos: usize) -> Result<Self, PositionError> {
        Self::create(doc, pos, pos)
    }

    pub fn anchor(&self) -> usize {
        self.anchor
    }

    pub fn head(&self) -> usize {
        self.head
    }
}

/// Selects exactly one node, addressed by the position before it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSelection {
    pos: usize,
    node: Node,
}

impl NodeSelection {
    pub fn create(doc: &Node, pos: usize) -> Result<Self, SelectionError> {
        let resolved = doc.resolve(pos)?;
        Self::at(&resolved)
    }

    fn at(pos: &ResolvedPos) -> Result<Self, SelectionError> {
        match pos.node_after() {
            Some(node) if !node.is_text() => Ok(Self {
                pos: pos.pos(),
                node,
            }),
            _ => Err(SelectionError::NoNodeAt(pos.pos())),
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn node(&self) -> &Node {
        &self.node
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Text(TextSelection),
    Node(NodeSelection),
}

impl Selection {
    pub fn anchor(&self) -> usize {
        match self {
            Selection::Text(sel) => sel.anchor,
            Selection::Node(sel) => sel.pos,
        }
    }

    pub fn head(&self) -> usize {
        match self {
            Selection::Text(sel) => sel.head,
            Selection::Node(sel) => sel.pos + sel.node.node_size(),
        }
    }

    pub fn from(&self) -> usize {
        self.anchor().min(self.head())
    }

    pub fn to(&self) -> usize {
        self.anchor().max(self.head())
    }

    pub fn is_empty(&self) -> bool {
        self.from() == self.to()
    }

    pub fn resolved_from(&self, doc: &Node) -> Result<ResolvedPos, PositionError> {
        doc.resolve(self.from())
    }

    pub fn resolved_to(&self, doc: &Node) -> Result<ResolvedPos, PositionError> {
        doc.resolve(self.to())
    }

    pub fn as_text(&self) -> Option<&TextSelection> {
        match self {
            Selection::Text(sel) => Some(sel),
            Selection::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeSelection> {
        match self {
            Selection::Node(sel) => Some(sel),
            Selection::Text(_) => None,
        }
    }

    /// The selection's cursor position, if it is an empty text selection.
    pub fn cursor(&self) -> Option<usize> {
        match self {
            Selection::Text(sel) if sel.anchor == sel.head => Some(sel.head),
            _ => None,
        }
    }

    /// Checks that the selection still addresses `doc`.
    pub fn validate(&self, doc: &Node) -> Result<(), SelectionError> {
        match self {
            Selection::Text(sel) => {
                TextSelection::create(doc, sel.anchor, sel.head)?;
            }
            Selection::Node(sel) => {
                let current = NodeSelection::create(doc, sel.pos)?;
                if current.node.node_type() != sel.node.node_type() {
                    return Err(SelectionError::NoNodeAt(sel.pos));
                }
            }
        }
        Ok(())
    }

    /// Maps the selection into `doc`, the document produced by `mapping`'s
    /// steps. Endpoints that no longer sit in inline content snap to the
    /// nearest valid selection.
    pub fn map(&self, doc: &Node, mapping: &dyn Mappable) -> Selection {
        let size = doc.content().size();
        let resolve = |pos: usize| doc.resolve(pos.min(size));
        let mapped = match self {
            Selection::Text(sel) => {
                let Ok(head) = resolve(mapping.map(sel.head, 1)) else {
                    return Selection::at_start(doc);
                };
                if !head.parent().inline_content() {
                    return Selection::near(&head, 1);
                }
                let Ok(anchor) = resolve(mapping.map(sel.anchor, 1)) else {
                    return Selection::at_start(doc);
                };
                let anchor = if anchor.parent().inline_content() {
                    anchor.pos()
                } else {
                    head.pos()
                };
                Some(Selection::Text(TextSelection {
                    anchor,
                    head: head.pos(),
                }))
            }
            Selection::Node(sel) => {
                let result = mapping.map_result(sel.pos, 1);
                let Ok(pos) = resolve(result.pos) else {
                    return Selection::at_start(doc);
                };
                if result.deleted {
                    return Selection::near(&pos, 1);
                }
                NodeSelection::at(&pos)
                    .ok()
                    .map(Selection::Node)
                    .or_else(|| Some(Selection::near(&pos, 1)))
            }
        };
        mapped.unwrap_or_else(|| Selection::at_start(doc))
    }

    /// First valid selection at or after the start of the document.
    pub fn at_start(doc: &Node) -> Selection {
        find_selection_in(doc, 0, 0, 1).unwrap_or_else(|| fallback(0))
    }

    pub fn at_end(doc: &Node) -> Selection {
        let size = doc.content().size();
        find_selection_in(doc, size, doc.child_count(), -1).unwrap_or_else(|| fallback(size))
    }

    /// Nearest valid selection from `pos`, searching in direction `dir` first.
    /// Cursors inside textblocks are preferred, then atom nodes.
    pub fn find_from(pos: &ResolvedPos, dir: isize) -> Option<Selection> {
        if pos.parent().inline_content() {
            return Some(Selection::Text(TextSelection {
                anchor: pos.pos(),
                head: pos.pos(),
            }));
        }
        if let Some(found) = find_selection_in(pos.parent(), pos.pos(), pos.index(pos.depth()), dir)
        {
            return Some(found);
        }
        for depth in (0..pos.depth()).rev() {
            let found = if dir < 0 {
                find_selection_in(pos.node(depth), pos.before(depth + 1), pos.index(depth), dir)
            } else {
                find_selection_in(
                    pos.node(depth),
                    pos.after(depth + 1),
                    pos.index(depth) + 1,
                    dir,
                )
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    pub fn near(pos: &ResolvedPos, bias: isize) -> Selection {
        Selection::find_from(pos, bias)
            .or_else(|| Selection::find_from(pos, -bias))
            .unwrap_or_else(|| fallback(pos.pos()))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Selection::Text(sel) => json!({"type": "text", "anchor": sel.anchor, "head": sel.head}),
            Selection::Node(sel) => json!({"type": "node", "anchor": sel.pos}),
        }
    }

    pub fn from_json(doc: &Node, value: &Value) -> Result<Selection, SelectionError> {
        let field = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .ok_or_else(|| SelectionError::Json(format!("selection is missing `{name}`")))
        };
        match value.get("type").and_then(Value::as_str) {
            Some("text") => Ok(Selection::Text(TextSelection::create(
                doc,
                field("anchor")?,
                field("head")?,
            )?)),
            Some("node") => Ok(Selection::Node(NodeSelection::create(doc, field("anchor")?)?)),
            other => Err(SelectionError::Json(format!(
                "unsupported selection type {other:?}"
            ))),
        }
    }
}

impl From<TextSelection> for Selection {
    fn from(sel: TextSelection) -> Self {
        Selection::Text(sel)
    }
}

impl From<NodeSelection> for Selection {
    fn from(sel: NodeSelection) -> Self {
        Selection::Node(sel)
    }
}

// Documents always hold a textblock or an atom in this crate's schemas; the
// fallback only covers hand-built documents outside them.
fn fallback(pos: usize) -> Selection {
    Selection::Text(TextSelection {
        anchor: pos,
        head: pos,
    })
}

/// Searches `node`'s children from `index` in direction `dir`, where `pos`
/// is the document position at that child boundary.
fn find_selection_in(node: &Node, pos: usize, index: usize, dir: isize) -> Option<Selection> {
    if node.inline_content() {
        return Some(Selection::Text(TextSelection {
            anchor: pos,
            head: pos,
        }));
    }
    let mut pos = pos as isize;
    let mut i = index as isize - if dir > 0 { 0 } else { 1 };
    while i >= 0 && (i as usize) < node.child_count() {
        let child = node.child(i as usize);
        if !child.is_atom() {
            let inner_pos = (pos + dir) as usize;
            let inner_index = if dir < 0 { child.child_count() } else { 0 };
            if let Some(inner) = find_selection_in(child, inner_pos, inner_index, dir) {
                return Some(inner);
            }
        } else if !child.is_text() {
            let start = if dir < 0 {
                pos - child.node_size() as isize
            } else {
                pos
            };
            return Some(Selection::Node(NodeSelection {
                pos: start as usize,
                node: child.clone(),
            }));
        }
        pos += child.node_size() as isize * dir;
        i += dir;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::StepMap;
    use crate::schema::Schema;

    fn sample() -> Node {
        let schema = Schema::basic();
        let hr = schema.node("horizontal_rule", None, vec![]).unwrap();
        let p = schema
            .node("paragraph", None, vec![schema.text("abc", vec![]).unwrap()])
            .unwrap();
        schema.node("doc", None, vec![hr, p]).unwrap()
    }

    #[test]
    fn at_start_prefers_first_selectable_target() {
        let doc = sample();
        let start = Selection::at_start(&doc);
        assert_eq!(start.as_node().map(|s| s.node().node_type().name()), Some("horizontal_rule"));
        assert_eq!(start.from(), 0);
        assert_eq!(Selection::at_end(&doc).cursor(), Some(5));
    }

    #[test]
    fn near_snaps_block_positions_into_textblocks() {
        let doc = sample();
        let pos = doc.resolve(1).unwrap();
        assert_eq!(Selection::near(&pos, 1).cursor(), Some(2));
        assert_eq!(Selection::near(&pos, -1).from(), 0);
    }

    #[test]
    fn mapping_a_deleted_node_selection_snaps_nearby() {
        let doc = sample();
        let sel = Selection::Node(NodeSelection::create(&doc, 0).unwrap());
        let after = doc.replace(0, 1, &crate::replace::Slice::empty()).unwrap();
        let mapped = sel.map(&after, &StepMap::new([(0, 1, 0)]));
        assert_eq!(mapped.cursor(), Some(1));
    }

    #[test]
    fn create_rejects_out_of_range_positions() {
        let doc = sample();
        assert!(TextSelection::create(&doc, 2, 99).is_err());
        assert!(NodeSelection::create(&doc, 2).is_err());
    }
}
