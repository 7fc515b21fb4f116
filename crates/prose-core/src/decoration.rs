use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::mapping::Mappable;
use crate::node::Node;
use crate::schema::ID_ATTR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecorationKind {
    /// Styles the inline content of a range.
    Inline,
    /// Styles exactly one node.
    Node,
    /// A zero-width marker at a position.
    Widget,
}

/// A rendering hint attached to a document range. Never part of the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub kind: DecorationKind,
    pub attrs: BTreeMap<String, String>,
}

impl Decoration {
    pub fn inline(from: usize, to: usize, attrs: BTreeMap<String, String>) -> Self {
        Self {
            from,
            to,
            kind: DecorationKind::Inline,
            attrs,
        }
    }

    pub fn node(from: usize, to: usize, attrs: BTreeMap<String, String>) -> Self {
        Self {
            from,
            to,
            kind: DecorationKind::Node,
            attrs,
        }
    }

    pub fn widget(pos: usize, attrs: BTreeMap<String, String>) -> Self {
        Self {
            from: pos,
            to: pos,
            kind: DecorationKind::Widget,
            attrs,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    fn fits(&self, doc: &Node) -> bool {
        if self.to > doc.content().size() || self.from > self.to {
            return false;
        }
        match self.kind {
            DecorationKind::Inline => self.from < self.to,
            DecorationKind::Widget => self.from == self.to,
            DecorationKind::Node => doc
                .node_at(self.from)
                .is_some_and(|node| !node.is_text() && self.from + node.node_size() == self.to),
        }
    }

    fn map(&self, mapping: &dyn Mappable) -> Option<Decoration> {
        let (from, to) = match self.kind {
            DecorationKind::Inline => {
                let from = mapping.map(self.from, 1);
                let to = mapping.map(self.to, -1);
                if from >= to {
                    return None;
                }
                (from, to)
            }
            DecorationKind::Node => {
                let from = mapping.map_result(self.from, 1);
                let to = mapping.map_result(self.to, -1);
                if from.deleted || to.deleted || to.pos <= from.pos {
                    return None;
                }
                (from.pos, to.pos)
            }
            DecorationKind::Widget => {
                let pos = mapping.map_result(self.from, -1);
                if pos.deleted {
                    return None;
                }
                (pos.pos, pos.pos)
            }
        };
        Some(Decoration {
            from,
            to,
            kind: self.kind,
            attrs: self.attrs.clone(),
        })
    }
}

/// An immutable, position-sorted collection of decorations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Arc<[Decoration]>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Keeps the decorations that fit `doc`; the rest are dropped.
    pub fn create(doc: &Node, decorations: impl IntoIterator<Item = Decoration>) -> Self {
        let mut kept: Vec<Decoration> = Vec::new();
        for deco in decorations {
            if deco.fits(doc) {
                kept.push(deco);
            } else {
                tracing::debug!(
                    from = deco.from,
                    to = deco.to,
                    kind = ?deco.kind,
                    "dropping decoration outside the document"
                );
            }
        }
        Self::sorted(kept)
    }

    fn sorted(mut decorations: Vec<Decoration>) -> Self {
        decorations.sort_by_key(|d| (d.from, d.to, d.kind));
        Self {
            decorations: Arc::from(decorations),
        }
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Decoration> {
        self.decorations.iter()
    }

    /// Decorations touching `[from, to]`.
    pub fn find(&self, from: usize, to: usize) -> Vec<&Decoration> {
        self.decorations
            .iter()
            .take_while(|d| d.from <= to)
            .filter(|d| d.to >= from)
            .collect()
    }

    /// Decorations a node view at `pos` receives: node decorations on exactly
    /// that node, plus inline and widget decorations inside its content.
    pub fn for_node(&self, pos: usize, node: &Node) -> Vec<&Decoration> {
        let end = pos + node.node_size();
        let (start, content_end) = if node.is_leaf() {
            (pos, pos)
        } else {
            (pos + 1, end - 1)
        };
        self.decorations
            .iter()
            .take_while(|d| d.from <= end)
            .filter(|d| match d.kind {
                DecorationKind::Node => d.from == pos && d.to == end,
                DecorationKind::Inline => !node.is_leaf() && d.from < content_end && d.to > start,
                DecorationKind::Widget => {
                    !node.is_leaf() && d.from >= start && d.from <= content_end
                }
            })
            .collect()
    }

    /// Maps every decoration through `mapping`, dropping the ones whose range
    /// was deleted.
    pub fn map(&self, mapping: &dyn Mappable) -> DecorationSet {
        Self::sorted(self.decorations.iter().filter_map(|d| d.map(mapping)).collect())
    }
}

impl<'a> IntoIterator for &'a DecorationSet {
    type Item = &'a Decoration;
    type IntoIter = std::slice::Iter<'a, Decoration>;

    fn into_iter(self) -> Self::IntoIter {
        self.decorations.iter()
    }
}

/// Node decorations for every node whose `id` has a lifecycle tag in `states`.
/// Computed per render; nothing here is cached or recorded in history.
pub fn node_state_decorations(doc: &Node, states: &HashMap<String, String>) -> DecorationSet {
    let mut decorations = Vec::new();
    doc.descendants(&mut |node, pos, _, _| {
        if let Some(Value::String(id)) = node.attr(ID_ATTR) {
            if let Some(tag) = states.get(id) {
                let attrs = BTreeMap::from([
                    ("class".to_string(), format!("node-state-{tag}")),
                    ("data-state".to_string(), tag.clone()),
                ]);
                decorations.push(Decoration::node(pos, pos + node.node_size(), attrs));
            }
        }
        !node.is_textblock()
    });
    DecorationSet::sorted(decorations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::StepMap;
    use crate::schema::Schema;

    fn doc() -> Node {
        let schema = Schema::basic();
        let p = |t: &str| {
            schema
                .node("paragraph", None, vec![schema.text(t, vec![]).unwrap()])
                .unwrap()
        };
        schema.node("doc", None, vec![p("hello"), p("world")]).unwrap()
    }

    #[test]
    fn create_drops_decorations_that_do_not_fit() {
        let doc = doc();
        let set = DecorationSet::create(
            &doc,
            [
                Decoration::node(0, 7, BTreeMap::new()),
                Decoration::node(0, 5, BTreeMap::new()),
                Decoration::inline(2, 4, BTreeMap::new()),
                Decoration::inline(3, 99, BTreeMap::new()),
                Decoration::widget(9, BTreeMap::new()),
            ],
        );
        assert_eq!(set.len(), 3);
        assert_eq!(set.find(8, 10).len(), 1);
        assert_eq!(set.for_node(0, doc.child(0)).len(), 2);
        assert_eq!(set.for_node(7, doc.child(1)).len(), 1);
    }

    #[test]
    fn map_shifts_and_drops() {
        let doc = doc();
        let set = DecorationSet::create(
            &doc,
            [
                Decoration::node(7, 14, BTreeMap::new()),
                Decoration::inline(2, 4, BTreeMap::new()),
            ],
        );
        let inserted = set.map(&StepMap::new([(1, 0, 3)]));
        let spans: Vec<(usize, usize)> = inserted.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(spans, vec![(5, 7), (10, 17)]);

        let deleted = set.map(&StepMap::new([(6, 8, 0)]));
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted.iter().next().map(|d| d.kind), Some(DecorationKind::Inline));
    }
}
