use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::Value;

use crate::decoration::{Decoration, DecorationSet};
use crate::error::SelectionError;
use crate::node::Node;
use crate::schema::ID_ATTR;
use crate::selection::{NodeSelection, Selection};
use crate::state::EditorState;
use crate::transaction::Transaction;

/// Live position of a rendered node. The bridge refreshes it on every render
/// and detaches it once the node is gone, so a host can hold it across
/// renders for hit-testing.
#[derive(Clone, Default)]
pub struct PosHandle {
    pos: Arc<AtomicUsize>,
    attached: Arc<AtomicBool>,
}

impl PosHandle {
    fn new(pos: usize) -> Self {
        Self {
            pos: Arc::new(AtomicUsize::new(pos)),
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Position before the node as of the latest render, `None` once detached.
    pub fn get(&self) -> Option<usize> {
        self.attached
            .load(Ordering::Acquire)
            .then(|| self.pos.load(Ordering::Acquire))
    }

    fn set(&self, pos: usize) {
        self.pos.store(pos, Ordering::Release);
        self.attached.store(true, Ordering::Release);
    }

    fn detach(&self) {
        self.attached.store(false, Ordering::Release);
    }
}

impl fmt::Debug for PosHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PosHandle").field(&self.get()).finish()
    }
}

pub struct NodeViewProps<'a> {
    pub node: &'a Node,
    pub pos: usize,
    pub decorations: Vec<&'a Decoration>,
    pub selection: &'a Selection,
    /// The node is the target of a node selection.
    pub selected: bool,
    /// Read fresh from the host on every render.
    pub editable: bool,
    /// `None` for text nodes.
    pub pos_handle: Option<PosHandle>,
}

impl NodeViewProps<'_> {
    /// The transaction selecting this node, for a view's select handler.
    pub fn select_node(&self, state: &EditorState) -> Result<Transaction, SelectionError> {
        let pos = self
            .pos_handle
            .as_ref()
            .and_then(PosHandle::get)
            .unwrap_or(self.pos);
        let selection = NodeSelection::create(state.doc(), pos)?;
        let mut tr = state.tr();
        tr.set_selection(selection);
        Ok(tr)
    }
}

/// Renders one node type. `children` are the already rendered children.
pub trait NodeView<E> {
    fn render(&self, props: &NodeViewProps<'_>, children: Vec<E>) -> E;
}

impl<E, F> NodeView<E> for F
where
    F: Fn(&NodeViewProps<'_>, Vec<E>) -> E,
{
    fn render(&self, props: &NodeViewProps<'_>, children: Vec<E>) -> E {
        self(props, children)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum NodeKey {
    Id(String),
    Path(Vec<usize>),
}

/// Walks the document and hands each node to the view registered for its
/// type, keeping one `PosHandle` per logical node across renders.
pub struct NodeViewBridge<E> {
    views: HashMap<String, Box<dyn NodeView<E>>>,
    fallback: Box<dyn NodeView<E>>,
    handles: HashMap<NodeKey, PosHandle>,
}

struct RenderCx<'a> {
    selection: &'a Selection,
    decorations: &'a DecorationSet,
    editable: bool,
    seen: HashSet<NodeKey>,
}

impl<E> NodeViewBridge<E> {
    pub fn new(fallback: impl NodeView<E> + 'static) -> Self {
        Self {
            views: HashMap::new(),
            fallback: Box::new(fallback),
            handles: HashMap::new(),
        }
    }

    pub fn register(
        mut self,
        type_name: impl Into<String>,
        view: impl NodeView<E> + 'static,
    ) -> Self {
        self.views.insert(type_name.into(), Box::new(view));
        self
    }

    /// Renders the top-level blocks of `state`'s document.
    pub fn render(
        &mut self,
        state: &EditorState,
        decorations: &DecorationSet,
        editable: bool,
    ) -> Vec<E> {
        let mut cx = RenderCx {
            selection: state.selection(),
            decorations,
            editable,
            seen: HashSet::new(),
        };
        let mut out = Vec::with_capacity(state.doc().child_count());
        let mut pos = 0;
        let mut path = Vec::new();
        for (ix, child) in state.doc().content().iter().enumerate() {
            path.push(ix);
            out.push(self.render_node(child, pos, &mut path, &mut cx));
            path.pop();
            pos += child.node_size();
        }

        let seen = cx.seen;
        self.handles.retain(|key, handle| {
            let keep = seen.contains(key);
            if !keep {
                handle.detach();
            }
            keep
        });
        out
    }

    /// Handle of the node carrying `id`, if it was rendered last time.
    pub fn handle(&self, id: &str) -> Option<PosHandle> {
        self.handles.get(&NodeKey::Id(id.to_string())).cloned()
    }

    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    fn render_node(
        &mut self,
        node: &Node,
        pos: usize,
        path: &mut Vec<usize>,
        cx: &mut RenderCx<'_>,
    ) -> E {
        let pos_handle = if node.is_text() {
            None
        } else {
            let key = match node.attr(ID_ATTR) {
                Some(Value::String(id)) if !cx.seen.contains(&NodeKey::Id(id.clone())) => {
                    NodeKey::Id(id.clone())
                }
                _ => NodeKey::Path(path.clone()),
            };
            let handle = self
                .handles
                .entry(key.clone())
                .or_insert_with(|| PosHandle::new(pos))
                .clone();
            handle.set(pos);
            cx.seen.insert(key);
            Some(handle)
        };

        let mut children = Vec::with_capacity(node.child_count());
        let mut child_pos = pos + 1;
        for (ix, child) in node.content().iter().enumerate() {
            path.push(ix);
            children.push(self.render_node(child, child_pos, path, cx));
            path.pop();
            child_pos += child.node_size();
        }

        let selected = matches!(
            cx.selection,
            Selection::Node(sel) if sel.pos() == pos && !node.is_text()
        );
        let props = NodeViewProps {
            node,
            pos,
            decorations: if node.is_text() {
                cx.decorations.find(pos, pos + node.node_size())
            } else {
                cx.decorations.for_node(pos, node)
            },
            selection: cx.selection,
            selected,
            editable: cx.editable,
            pos_handle,
        };
        let view = self
            .views
            .get(node.node_type().name())
            .unwrap_or(&self.fallback);
        view.render(&props, children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attrs, Schema};
    use crate::state::StateConfig;

    fn outline(props: &NodeViewProps<'_>, children: Vec<String>) -> String {
        if let Some(text) = props.node.text() {
            return text.to_string();
        }
        let marker = if props.selected { "*" } else { "" };
        format!(
            "{}{marker}@{}({})",
            props.node.node_type().name(),
            props.pos,
            children.join(",")
        )
    }

    fn state() -> EditorState {
        let schema = Schema::basic();
        let p = |id: &str, text: &str| {
            let attrs = Attrs::from([(ID_ATTR.to_string(), Value::from(id))]);
            schema
                .node("paragraph", Some(&attrs), vec![schema.text(text, vec![]).unwrap()])
                .unwrap()
        };
        let hr = schema.node("horizontal_rule", None, vec![]).unwrap();
        let doc = schema
            .node("doc", None, vec![p("a", "hello"), hr, p("b", "world")])
            .unwrap();
        EditorState::create(StateConfig::new(schema).doc(doc)).unwrap()
    }

    fn rule(props: &NodeViewProps<'_>, _children: Vec<String>) -> String {
        format!("<hr {}>", props.editable)
    }

    #[test]
    fn renders_depth_first_with_positions() {
        let state = state();
        let mut tr = state.tr();
        tr.set_selection(NodeSelection::create(state.doc(), 7).unwrap());
        let state = state.apply(tr).unwrap();
        let mut bridge: NodeViewBridge<String> = NodeViewBridge::new(outline);
        let out = bridge.render(&state, &DecorationSet::empty(), true);
        assert_eq!(
            out,
            vec![
                "paragraph@0(hello)".to_string(),
                "horizontal_rule*@7()".to_string(),
                "paragraph@8(world)".to_string(),
            ]
        );
        assert_eq!(bridge.handle_count(), 3);
    }

    #[test]
    fn handles_follow_edits_and_detach() {
        let state = state();
        let mut bridge: NodeViewBridge<String> = NodeViewBridge::new(outline);
        bridge.render(&state, &DecorationSet::empty(), true);
        let b = bridge.handle("b").unwrap();
        assert_eq!(b.get(), Some(8));

        let mut tr = state.tr();
        tr.insert_text("XY", 1, 1).unwrap();
        tr.delete(9, 10).unwrap();
        let state = state.apply(tr).unwrap();
        bridge.render(&state, &DecorationSet::empty(), false);

        assert_eq!(b.get(), Some(9));
        assert_eq!(bridge.handle("a").and_then(|h| h.get()), Some(0));
        assert_eq!(bridge.handle_count(), 2);
    }

    #[test]
    fn registered_view_wins_over_fallback() {
        let state = state();
        let mut bridge: NodeViewBridge<String> =
            NodeViewBridge::new(outline).register("horizontal_rule", rule);
        let out = bridge.render(&state, &DecorationSet::empty(), false);
        assert_eq!(out[1], "<hr false>");
    }

    #[test]
    fn select_node_uses_live_position() {
        let state = state();
        let node = state.doc().child(1).clone();
        let props = NodeViewProps {
            node: &node,
            pos: 7,
            decorations: Vec::new(),
            selection: state.selection(),
            selected: false,
            editable: true,
            pos_handle: Some(PosHandle::new(7)),
        };
        let tr = props.select_node(&state).unwrap();
        assert_eq!(tr.selection().as_node().map(NodeSelection::pos), Some(7));
    }
}
