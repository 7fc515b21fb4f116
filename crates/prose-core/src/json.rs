use serde_json::{Map, Value};

use crate::error::SchemaError;
use crate::fragment::Fragment;
use crate::node::{Mark, Node};
use crate::replace::Slice;
use crate::schema::{Attrs, Schema};

impl Mark {
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.mark_type().name().to_string()));
        if !self.attrs().is_empty() {
            obj.insert("attrs".into(), attrs_to_json(self.attrs()));
        }
        Value::Object(obj)
    }
}

impl Node {
    /// `{type, attrs?, content?, text?, marks?}`, the persisted shape of a node.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("type".into(), Value::String(self.node_type().name().to_string()));
        if !self.attrs().is_empty() {
            obj.insert("attrs".into(), attrs_to_json(self.attrs()));
        }
        if self.content().child_count() > 0 {
            obj.insert("content".into(), self.content().to_json());
        }
        if let Some(text) = self.text() {
            obj.insert("text".into(), Value::String(text.to_string()));
        }
        if !self.marks().is_empty() {
            obj.insert(
                "marks".into(),
                Value::Array(self.marks().iter().map(Mark::to_json).collect()),
            );
        }
        Value::Object(obj)
    }
}

impl Fragment {
    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(Node::to_json).collect())
    }
}

impl Slice {
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("content".into(), self.content.to_json());
        if self.open_start > 0 {
            obj.insert("openStart".into(), Value::from(self.open_start));
        }
        if self.open_end > 0 {
            obj.insert("openEnd".into(), Value::from(self.open_end));
        }
        Value::Object(obj)
    }

    /// Slices are open, so their outer nodes are not checked against the
    /// schema until they are placed into a document.
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Slice, SchemaError> {
        let open = |name: &str| {
            value
                .get(name)
                .map(|v| {
                    v.as_u64()
                        .map(|n| n as usize)
                        .ok_or_else(|| SchemaError::Json(format!("`{name}` must be a number")))
                })
                .transpose()
                .map(Option::unwrap_or_default)
        };
        let content = match value.get("content") {
            Some(content) => schema.fragment_from_json(content, false)?,
            None => Fragment::empty(),
        };
        Ok(Slice::new(content, open("openStart")?, open("openEnd")?))
    }
}

fn attrs_to_json(attrs: &Attrs) -> Value {
    Value::Object(attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn attrs_from_json(value: Option<&Value>) -> Result<Option<Attrs>, SchemaError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        Some(_) => Err(SchemaError::Json("`attrs` must be an object".into())),
    }
}

impl Schema {
    /// Parses a persisted node, validating types, attributes and content.
    pub fn node_from_json(&self, value: &Value) -> Result<Node, SchemaError> {
        self.node_from_json_checked(value, true)
    }

    pub(crate) fn fragment_from_json(
        &self,
        value: &Value,
        checked: bool,
    ) -> Result<Fragment, SchemaError> {
        let Value::Array(items) = value else {
            return Err(SchemaError::Json("`content` must be an array".into()));
        };
        let nodes = items
            .iter()
            .map(|item| self.node_from_json_checked(item, checked))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Fragment::from_nodes(nodes))
    }

    fn node_from_json_checked(&self, value: &Value, checked: bool) -> Result<Node, SchemaError> {
        let Some(type_name) = value.get("type").and_then(Value::as_str) else {
            return Err(SchemaError::Json("node is missing `type`".into()));
        };
        let marks = match value.get("marks") {
            None => Vec::new(),
            Some(Value::Array(marks)) => marks
                .iter()
                .map(|mark| {
                    let name = mark
                        .get("type")
                        .and_then(Value::as_str)
                        .ok_or_else(|| SchemaError::Json("mark is missing `type`".into()))?;
                    self.mark(name, attrs_from_json(mark.get("attrs"))?.as_ref())
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(SchemaError::Json("`marks` must be an array".into())),
        };

        if type_name == "text" {
            let text = value
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::Json("text node is missing `text`".into()))?;
            return self.text(text, marks);
        }

        let node_type = self
            .node_type(type_name)
            .ok_or_else(|| SchemaError::UnknownNodeType(type_name.to_string()))?;
        let content = match value.get("content") {
            Some(content) => self.fragment_from_json(content, true)?,
            None => Fragment::empty(),
        };
        let attrs = attrs_from_json(value.get("attrs"))?;
        if checked {
            node_type.create(attrs.as_ref(), content, marks)
        } else {
            let attrs = node_type.compute_attrs(attrs.as_ref())?;
            Ok(Node::element(node_type.clone(), attrs, content, marks))
        }
    }
}
