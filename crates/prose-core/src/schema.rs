use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::fragment::Fragment;
use crate::node::{Mark, Node};

pub type Attrs = BTreeMap<String, Value>;

/// Attribute whose value identifies a node to the persistence layer.
pub const ID_ATTR: &str = "id";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrSpec {
    /// `None` makes the attribute required.
    #[serde(default)]
    pub default: Option<Value>,
}

impl AttrSpec {
    pub fn required() -> Self {
        Self { default: None }
    }

    pub fn with_default(value: impl Into<Value>) -> Self {
        Self {
            default: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSpec {
    pub content: String,
    pub group: String,
    pub inline: bool,
    pub atom: bool,
    pub attrs: BTreeMap<String, AttrSpec>,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }

    pub fn atom(mut self) -> Self {
        self.atom = true;
        self
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        self.attrs.insert(name.into(), spec);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarkSpec {
    pub attrs: BTreeMap<String, AttrSpec>,
}

impl MarkSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: impl Into<String>, spec: AttrSpec) -> Self {
        self.attrs.insert(name.into(), spec);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentTerm {
    types: Vec<String>,
    min: usize,
    max: Option<usize>,
}

impl ContentTerm {
    fn accepts(&self, name: &str) -> bool {
        self.types.iter().any(|t| t == name)
    }
}

/// A compiled content expression such as `"block+"` or `"(paragraph | heading)*"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentExpr {
    source: String,
    terms: Vec<ContentTerm>,
}

impl ContentExpr {
    fn parse(
        source: &str,
        resolve: &dyn Fn(&str) -> Option<Vec<String>>,
    ) -> Result<Self, SchemaError> {
        let err = |reason: &str| SchemaError::InvalidContentExpr {
            expr: source.to_string(),
            reason: reason.to_string(),
        };

        let tokens = tokenize(source);
        let mut terms = Vec::new();
        let mut ix = 0;
        while ix < tokens.len() {
            let mut names: Vec<String> = Vec::new();
            if tokens[ix] == "(" {
                ix += 1;
                loop {
                    let Some(tok) = tokens.get(ix) else {
                        return Err(err("unclosed group"));
                    };
                    if !is_name(tok) {
                        return Err(err("expected a name inside group"));
                    }
                    names.push(tok.clone());
                    ix += 1;
                    match tokens.get(ix).map(String::as_str) {
                        Some("|") => ix += 1,
                        Some(")") => {
                            ix += 1;
                            break;
                        }
                        _ => return Err(err("expected `|` or `)`")),
                    }
                }
            } else if is_name(&tokens[ix]) {
                names.push(tokens[ix].clone());
                ix += 1;
            } else {
                return Err(err(&format!("unexpected token `{}`", tokens[ix])));
            }

            let (min, max) = match tokens.get(ix).map(String::as_str) {
                Some("*") => (0, None),
                Some("+") => (1, None),
                Some("?") => (0, Some(1)),
                _ => (1, Some(1)),
            };
            if matches!(tokens.get(ix).map(String::as_str), Some("*" | "+" | "?")) {
                ix += 1;
            }

            let mut types = Vec::new();
            for name in names {
                let Some(resolved) = resolve(&name) else {
                    return Err(err(&format!("no node type or group named `{name}`")));
                };
                for t in resolved {
                    if !types.contains(&t) {
                        types.push(t);
                    }
                }
            }
            terms.push(ContentTerm { types, min, max });
        }

        Ok(Self {
            source: source.to_string(),
            terms,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn allowed_types(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().flat_map(|t| t.types.iter().map(String::as_str))
    }

    pub fn allows(&self, type_name: &str) -> bool {
        self.allowed_types().any(|t| t == type_name)
    }

    pub fn matches<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> bool {
        let names: Vec<&str> = names.into_iter().collect();
        match_terms(&self.terms, 0, &names, 0)
    }
}

fn match_terms(terms: &[ContentTerm], ti: usize, names: &[&str], ci: usize) -> bool {
    let Some(term) = terms.get(ti) else {
        return ci == names.len();
    };
    let mut run = 0;
    while ci + run < names.len()
        && term.max.is_none_or(|max| run < max)
        && term.accepts(names[ci + run])
    {
        run += 1;
    }
    if run < term.min {
        return false;
    }
    (term.min..=run)
        .rev()
        .any(|take| match_terms(terms, ti + 1, names, ci + take))
}

fn tokenize(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in source.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
            continue;
        }
        if !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if !ch.is_whitespace() {
            tokens.push(ch.to_string());
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn is_name(token: &str) -> bool {
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
}

struct NodeTypeInner {
    name: String,
    groups: Vec<String>,
    spec: NodeSpec,
    content: ContentExpr,
    inline_content: bool,
    is_text: bool,
}

#[derive(Clone)]
pub struct NodeType(Arc<NodeTypeInner>);

impl NodeType {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn groups(&self) -> &[String] {
        &self.0.groups
    }

    pub fn spec(&self) -> &NodeSpec {
        &self.0.spec
    }

    pub fn content_expr(&self) -> &ContentExpr {
        &self.0.content
    }

    pub fn is_text(&self) -> bool {
        self.0.is_text
    }

    pub fn is_inline(&self) -> bool {
        self.0.spec.inline || self.0.is_text
    }

    pub fn is_block(&self) -> bool {
        !self.is_inline()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.content.is_empty()
    }

    pub fn is_atom(&self) -> bool {
        self.is_leaf() || self.0.spec.atom
    }

    pub fn inline_content(&self) -> bool {
        self.0.inline_content
    }

    pub fn is_textblock(&self) -> bool {
        self.is_block() && self.0.inline_content
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.0.spec.attrs.contains_key(name)
    }

    /// Two types can be joined when they accept at least one common child type.
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other
            || self
                .0
                .content
                .allowed_types()
                .any(|t| other.0.content.allows(t))
    }

    pub fn valid_content(&self, content: &Fragment) -> bool {
        self.0
            .content
            .matches(content.iter().map(|child| child.node_type().name()))
    }

    pub fn check_content(&self, content: &Fragment) -> Result<(), SchemaError> {
        if self.valid_content(content) {
            Ok(())
        } else {
            Err(SchemaError::InvalidContent(self.name().to_string()))
        }
    }

    pub fn compute_attrs(&self, given: Option<&Attrs>) -> Result<Attrs, SchemaError> {
        let mut attrs = Attrs::new();
        for (name, spec) in &self.0.spec.attrs {
            let value = given
                .and_then(|g| g.get(name).cloned())
                .or_else(|| spec.default.clone());
            let Some(value) = value else {
                return Err(SchemaError::MissingAttr {
                    type_name: self.name().to_string(),
                    attr: name.clone(),
                });
            };
            attrs.insert(name.clone(), value);
        }
        Ok(attrs)
    }

    pub fn create(
        &self,
        attrs: Option<&Attrs>,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Result<Node, SchemaError> {
        if self.is_text() {
            return Err(SchemaError::InvalidContent(
                "text nodes are created with Schema::text".into(),
            ));
        }
        let attrs = self.compute_attrs(attrs)?;
        self.check_content(&content)?;
        Ok(Node::element(self.clone(), attrs, content, marks))
    }

    fn create_and_fill_in(
        &self,
        attrs: Option<&Attrs>,
        schema: &Schema,
    ) -> Result<Node, SchemaError> {
        let mut children = Vec::new();
        for term in &self.0.content.terms {
            if term.min == 0 {
                continue;
            }
            let Some(fill) = term
                .types
                .iter()
                .filter_map(|name| schema.node_type(name))
                .find(|t| !t.is_text() && t.0.spec.attrs.values().all(|a| a.default.is_some()))
            else {
                return Err(SchemaError::InvalidContent(self.name().to_string()));
            };
            for _ in 0..term.min {
                children.push(fill.create_and_fill_in(None, schema)?);
            }
        }
        self.create(attrs, Fragment::from_nodes(children), Vec::new())
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for NodeType {}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.0.name)
    }
}

struct MarkTypeInner {
    name: String,
    rank: usize,
    spec: MarkSpec,
}

#[derive(Clone)]
pub struct MarkType(Arc<MarkTypeInner>);

impl MarkType {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn rank(&self) -> usize {
        self.0.rank
    }

    pub fn create(&self, attrs: Option<&Attrs>) -> Result<Mark, SchemaError> {
        let mut computed = Attrs::new();
        for (name, spec) in &self.0.spec.attrs {
            let value = attrs
                .and_then(|g| g.get(name).cloned())
                .or_else(|| spec.default.clone());
            let Some(value) = value else {
                return Err(SchemaError::MissingAttr {
                    type_name: self.name().to_string(),
                    attr: name.clone(),
                });
            };
            computed.insert(name.clone(), value);
        }
        Ok(Mark::new(self.clone(), computed))
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for MarkType {}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkType({})", self.0.name)
    }
}

struct SchemaInner {
    nodes: Vec<NodeType>,
    marks: Vec<MarkType>,
    top_node: NodeType,
    text: NodeType,
}

#[derive(Clone)]
pub struct Schema(Arc<SchemaInner>);

impl Schema {
    /// Builds a schema from node specs in declaration order. Groups expand to
    /// their members in that order.
    pub fn new(
        nodes: Vec<(String, NodeSpec)>,
        marks: Vec<(String, MarkSpec)>,
        top_node: &str,
    ) -> Result<Self, SchemaError> {
        let names: Vec<String> = nodes.iter().map(|(n, _)| n.clone()).collect();
        let resolve = |name: &str| -> Option<Vec<String>> {
            if names.iter().any(|n| n == name) {
                return Some(vec![name.to_string()]);
            }
            let members: Vec<String> = nodes
                .iter()
                .filter(|(_, spec)| spec.group.split_whitespace().any(|g| g == name))
                .map(|(n, _)| n.clone())
                .collect();
            (!members.is_empty()).then_some(members)
        };

        let mut compiled = Vec::with_capacity(nodes.len());
        for (name, spec) in &nodes {
            let content = ContentExpr::parse(&spec.content, &resolve)?;
            compiled.push((name.clone(), spec.clone(), content));
        }

        let is_inline = |name: &str| {
            name == "text"
                || nodes
                    .iter()
                    .any(|(n, spec)| n == name && spec.inline)
        };

        let node_types: Vec<NodeType> = compiled
            .into_iter()
            .map(|(name, spec, content)| {
                let inline_content = content.allowed_types().any(|t| is_inline(t));
                NodeType(Arc::new(NodeTypeInner {
                    is_text: name == "text",
                    groups: spec.group.split_whitespace().map(str::to_string).collect(),
                    name,
                    spec,
                    content,
                    inline_content,
                }))
            })
            .collect();

        let find = |name: &str| node_types.iter().find(|t| t.name() == name).cloned();
        let top = find(top_node).ok_or_else(|| SchemaError::MissingNodeType(top_node.into()))?;
        let text = find("text").ok_or_else(|| SchemaError::MissingNodeType("text".into()))?;

        let mark_types = marks
            .into_iter()
            .enumerate()
            .map(|(rank, (name, spec))| MarkType(Arc::new(MarkTypeInner { name, rank, spec })))
            .collect();

        Ok(Self(Arc::new(SchemaInner {
            nodes: node_types,
            marks: mark_types,
            top_node: top,
            text,
        })))
    }

    /// The schema used by the story editor: paragraphs and headings carry a
    /// stable `id` attribute.
    pub fn basic() -> Self {
        let id = || AttrSpec::with_default(Value::Null);
        let nodes = vec![
            ("doc".to_string(), NodeSpec::new().content("block+")),
            (
                "paragraph".to_string(),
                NodeSpec::new()
                    .content("inline*")
                    .group("block")
                    .attr(ID_ATTR, id()),
            ),
            (
                "heading".to_string(),
                NodeSpec::new()
                    .content("inline*")
                    .group("block")
                    .attr("level", AttrSpec::with_default(1))
                    .attr(ID_ATTR, id()),
            ),
            (
                "blockquote".to_string(),
                NodeSpec::new().content("block+").group("block"),
            ),
            (
                "horizontal_rule".to_string(),
                NodeSpec::new().group("block").atom(),
            ),
            ("text".to_string(), NodeSpec::new().group("inline")),
            (
                "hard_break".to_string(),
                NodeSpec::new().group("inline").inline().atom(),
            ),
        ];
        let marks = vec![
            ("strong".to_string(), MarkSpec::new()),
            ("em".to_string(), MarkSpec::new()),
            (
                "link".to_string(),
                MarkSpec::new().attr("href", AttrSpec::required()),
            ),
        ];
        match Self::new(nodes, marks, "doc") {
            Ok(schema) => schema,
            Err(err) => unreachable!("basic schema must be valid: {err}"),
        }
    }

    pub fn top_node_type(&self) -> &NodeType {
        &self.0.top_node
    }

    pub fn node_type(&self, name: &str) -> Option<&NodeType> {
        self.0.nodes.iter().find(|t| t.name() == name)
    }

    pub fn node_types(&self) -> &[NodeType] {
        &self.0.nodes
    }

    pub fn mark_type(&self, name: &str) -> Option<&MarkType> {
        self.0.marks.iter().find(|t| t.name() == name)
    }

    pub fn node(
        &self,
        type_name: &str,
        attrs: Option<&Attrs>,
        content: Vec<Node>,
    ) -> Result<Node, SchemaError> {
        let ty = self
            .node_type(type_name)
            .ok_or_else(|| SchemaError::UnknownNodeType(type_name.to_string()))?;
        ty.create(attrs, Fragment::from_nodes(content), Vec::new())
    }

    pub fn text(&self, text: impl Into<String>, marks: Vec<Mark>) -> Result<Node, SchemaError> {
        let text = text.into();
        if text.is_empty() {
            return Err(SchemaError::EmptyText);
        }
        Ok(Node::text_node(self.0.text.clone(), text, Mark::sort_set(marks)))
    }

    pub fn mark(&self, name: &str, attrs: Option<&Attrs>) -> Result<Mark, SchemaError> {
        self.mark_type(name)
            .ok_or_else(|| SchemaError::UnknownMarkType(name.to_string()))?
            .create(attrs)
    }

    /// Creates the smallest node of the given type that satisfies its content
    /// expression.
    pub fn create_and_fill(&self, type_name: &str) -> Result<Node, SchemaError> {
        let ty = self
            .node_type(type_name)
            .ok_or_else(|| SchemaError::UnknownNodeType(type_name.to_string()))?;
        ty.create_and_fill_in(None, self)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("nodes", &self.0.nodes)
            .field("marks", &self.0.marks)
            .finish()
    }
}
