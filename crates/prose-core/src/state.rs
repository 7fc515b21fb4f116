use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{ApplyError, SchemaError, StateError};
use crate::node::Node;
use crate::plugin::{Plugin, PluginState};
use crate::schema::Schema;
use crate::selection::Selection;
use crate::transaction::{META_APPENDED_TRANSACTION, Transaction};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Passes of the append-transaction loop before it gives up.
    pub max_append_rounds: usize,
}

impl Limits {
    pub(crate) fn with_defaults(mut self) -> Self {
        if self.max_append_rounds == 0 {
            self.max_append_rounds = 100;
        }
        self
    }
}

pub struct StateConfig {
    pub schema: Schema,
    pub doc: Option<Node>,
    pub selection: Option<Selection>,
    pub plugins: Vec<Arc<dyn Plugin>>,
    pub limits: Limits,
}

impl StateConfig {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            doc: None,
            selection: None,
            plugins: Vec::new(),
            limits: Limits::default(),
        }
    }

    pub fn doc(mut self, doc: Node) -> Self {
        self.doc = Some(doc);
        self
    }

    pub fn selection(mut self, selection: impl Into<Selection>) -> Self {
        self.selection = Some(selection.into());
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn plugins(mut self, plugins: impl IntoIterator<Item = Arc<dyn Plugin>>) -> Self {
        self.plugins.extend(plugins);
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

struct Config {
    schema: Schema,
    plugins: Vec<Arc<dyn Plugin>>,
    limits: Limits,
}

/// An immutable editor snapshot. Cloning shares the document and config.
#[derive(Clone)]
pub struct EditorState {
    config: Arc<Config>,
    doc: Node,
    selection: Selection,
    plugin_states: Vec<Option<PluginState>>,
}

struct Seen {
    state: EditorState,
    n: usize,
}

impl EditorState {
    pub fn create(config: StateConfig) -> Result<Self, StateError> {
        let mut keys = HashSet::new();
        for plugin in &config.plugins {
            if !keys.insert(plugin.key().to_string()) {
                return Err(StateError::DuplicatePlugin(plugin.key().to_string()));
            }
        }
        let doc = match config.doc {
            Some(doc) => {
                if doc.node_type() != config.schema.top_node_type() {
                    return Err(StateError::Schema(SchemaError::InvalidContent(format!(
                        "document root must be {}, got {}",
                        config.schema.top_node_type().name(),
                        doc.node_type().name()
                    ))));
                }
                doc
            }
            None => config
                .schema
                .create_and_fill(config.schema.top_node_type().name())?,
        };
        let selection = match config.selection {
            Some(selection) => {
                selection.validate(&doc)?;
                selection
            }
            None => Selection::at_start(&doc),
        };

        let plugin_count = config.plugins.len();
        let mut state = EditorState {
            config: Arc::new(Config {
                schema: config.schema,
                plugins: config.plugins,
                limits: config.limits.with_defaults(),
            }),
            doc,
            selection,
            plugin_states: vec![None; plugin_count],
        };
        for ix in 0..plugin_count {
            let plugin = Arc::clone(&state.config.plugins[ix]);
            state.plugin_states[ix] = plugin.init(&state);
        }
        tracing::debug!(plugins = plugin_count, "editor state created");
        Ok(state)
    }

    pub fn schema(&self) -> &Schema {
        &self.config.schema
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn plugins(&self) -> &[Arc<dyn Plugin>] {
        &self.config.plugins
    }

    pub fn limits(&self) -> Limits {
        self.config.limits
    }

    pub fn plugin_state(&self, key: &str) -> Option<&PluginState> {
        let ix = self.config.plugins.iter().position(|p| p.key() == key)?;
        self.plugin_states[ix].as_ref()
    }

    /// A transaction that starts from this state.
    pub fn tr(&self) -> Transaction {
        Transaction::new(
            self.config.schema.clone(),
            self.doc.clone(),
            self.selection.clone(),
        )
    }

    pub fn apply(&self, tr: Transaction) -> Result<EditorState, ApplyError> {
        self.apply_transaction(tr).map(|(state, _)| state)
    }

    /// Applies `root` and every transaction plugins append in response.
    /// Returns the settled state and all applied transactions, `root` first.
    /// A vetoed root leaves the state unchanged and returns no transactions.
    pub fn apply_transaction(
        &self,
        root: Transaction,
    ) -> Result<(EditorState, Vec<Transaction>), ApplyError> {
        if !self.filter_transaction(&root, None) {
            tracing::debug!("transaction filtered out");
            return Ok((self.clone(), Vec::new()));
        }

        let mut new_state = self.apply_inner(&root)?;
        let mut trs = vec![root];
        let mut seen: Option<Vec<Seen>> = None;
        let plugins = &self.config.plugins;
        let max_rounds = self.config.limits.max_append_rounds;
        let mut rounds = 0;

        loop {
            let mut have_new = false;
            for (ix, plugin) in plugins.iter().enumerate() {
                let (n, old_state) = match &seen {
                    Some(seen) => (seen[ix].n, &seen[ix].state),
                    None => (0, self),
                };
                if n < trs.len() {
                    match plugin.append_transaction(&trs[n..], old_state, &new_state) {
                        Ok(Some(mut tr)) if new_state.filter_transaction(&tr, Some(ix)) => {
                            tr.set_meta(META_APPENDED_TRANSACTION, true);
                            match new_state.apply_inner(&tr) {
                                Ok(next) => {
                                    if seen.is_none() {
                                        seen = Some(
                                            (0..plugins.len())
                                                .map(|j| {
                                                    if j < ix {
                                                        Seen {
                                                            state: new_state.clone(),
                                                            n: trs.len(),
                                                        }
                                                    } else {
                                                        Seen {
                                                            state: self.clone(),
                                                            n: 0,
                                                        }
                                                    }
                                                })
                                                .collect(),
                                        );
                                    }
                                    tracing::debug!(
                                        plugin = plugin.key(),
                                        steps = tr.steps().len(),
                                        "appended transaction"
                                    );
                                    trs.push(tr);
                                    new_state = next;
                                    have_new = true;
                                }
                                Err(err) => tracing::warn!(
                                    plugin = plugin.key(),
                                    %err,
                                    "appended transaction failed to apply; skipping"
                                ),
                            }
                        }
                        Ok(_) => {}
                        Err(err) => tracing::warn!(
                            plugin = plugin.key(),
                            %err,
                            "append_transaction failed; skipping plugin for this pass"
                        ),
                    }
                }
                if let Some(seen) = &mut seen {
                    seen[ix] = Seen {
                        state: new_state.clone(),
                        n: trs.len(),
                    };
                }
            }
            if !have_new {
                return Ok((new_state, trs));
            }
            rounds += 1;
            if rounds >= max_rounds {
                tracing::warn!(
                    rounds,
                    transactions = trs.len(),
                    "append-transaction loop hit its round limit; returning the settled state"
                );
                return Ok((new_state, trs));
            }
        }
    }

    fn filter_transaction(&self, tr: &Transaction, ignore: Option<usize>) -> bool {
        for (ix, plugin) in self.config.plugins.iter().enumerate() {
            if Some(ix) == ignore {
                continue;
            }
            match plugin.filter_transaction(tr, self) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(plugin = plugin.key(), "transaction vetoed");
                    return false;
                }
                Err(err) => tracing::warn!(
                    plugin = plugin.key(),
                    %err,
                    "filter_transaction failed; ignoring plugin"
                ),
            }
        }
        true
    }

    fn apply_inner(&self, tr: &Transaction) -> Result<EditorState, ApplyError> {
        if !tr.before().ptr_eq(&self.doc) && tr.before() != &self.doc {
            tracing::warn!("transaction was built on another document; rejecting it");
            return Err(ApplyError::MismatchedTransaction);
        }
        let doc = tr.doc().clone();
        let selection = tr.selection().clone();
        selection.validate(&doc)?;

        let mut new_state = EditorState {
            config: Arc::clone(&self.config),
            doc,
            selection,
            plugin_states: vec![None; self.plugin_states.len()],
        };
        for (ix, plugin) in self.config.plugins.iter().enumerate() {
            if let Some(value) = &self.plugin_states[ix] {
                new_state.plugin_states[ix] = Some(plugin.apply(tr, value, self, &new_state));
            }
        }
        Ok(new_state)
    }

    /// `{doc, selection}`; plugin state is not serialized.
    pub fn to_json(&self) -> Value {
        json!({
            "doc": self.doc.to_json(),
            "selection": self.selection.to_json(),
        })
    }

    /// Rebuilds a state from `to_json` output using `config`'s schema and
    /// plugins. The config's own doc and selection are ignored.
    pub fn from_json(mut config: StateConfig, value: &Value) -> Result<Self, StateError> {
        let doc_json = value
            .get("doc")
            .ok_or_else(|| SchemaError::Json("state is missing `doc`".into()))?;
        let doc = config.schema.node_from_json(doc_json)?;
        let selection = match value.get("selection") {
            Some(sel) => Some(Selection::from_json(&doc, sel)?),
            None => None,
        };
        config.doc = Some(doc);
        config.selection = selection;
        EditorState::create(config)
    }
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("doc", &self.doc)
            .field("selection", &self.selection)
            .field(
                "plugins",
                &self.config.plugins.iter().map(|p| p.key()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
