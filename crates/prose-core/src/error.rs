use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("Unknown mark type: {0}")]
    UnknownMarkType(String),

    #[error("Schema is missing the `{0}` node type")]
    MissingNodeType(String),

    #[error("Invalid content expression `{expr}`: {reason}")]
    InvalidContentExpr { expr: String, reason: String },

    #[error("No value supplied for required attribute `{attr}` on {type_name}")]
    MissingAttr { type_name: String, attr: String },

    #[error("Invalid content for node {0}")]
    InvalidContent(String),

    #[error("Empty text nodes are not allowed")]
    EmptyText,

    #[error("Invalid JSON: {0}")]
    Json(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("Position {pos} out of range (document size {size})")]
    OutOfRange { pos: usize, size: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplaceError {
    #[error("Inserted content deeper than insertion position")]
    TooDeep,

    #[error("Inconsistent open depths")]
    InconsistentOpenDepths,

    #[error("Replace range {from}..{to} is reversed")]
    ReversedRange { from: usize, to: usize },

    #[error("Cannot join {sub} onto {main}")]
    CannotJoin { main: String, sub: String },

    #[error("Invalid content for node {0}")]
    InvalidContent(String),

    #[error(transparent)]
    Position(#[from] PositionError),
}

impl From<SchemaError> for ReplaceError {
    fn from(value: SchemaError) -> Self {
        match value {
            SchemaError::InvalidContent(name) => ReplaceError::InvalidContent(name),
            other => ReplaceError::InvalidContent(other.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Step failed: {0}")]
    StepFailed(String),

    #[error(transparent)]
    Position(#[from] PositionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error(transparent)]
    Position(#[from] PositionError),

    #[error("No node at position {0}")]
    NoNodeAt(usize),

    #[error("Invalid selection JSON: {0}")]
    Json(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Duplicate plugin key: {0}")]
    DuplicatePlugin(String),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Transaction was built on a different document")]
    MismatchedTransaction,

    #[error(transparent)]
    Selection(#[from] SelectionError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Plugin `{plugin}` failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub message: String,
}

impl PluginError {
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}
