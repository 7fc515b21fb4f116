use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::PluginError;
use crate::state::EditorState;
use crate::transaction::Transaction;

/// Opaque per-plugin state stored on every `EditorState`.
pub type PluginState = Arc<dyn Any + Send + Sync>;

/// Session-lived middleware. Every hook has a no-op default, so a plugin only
/// implements what it needs.
pub trait Plugin: Send + Sync {
    /// Unique within one state.
    fn key(&self) -> &str;

    fn init(&self, _state: &EditorState) -> Option<PluginState> {
        None
    }

    /// Computes the plugin's state after `tr`. `new` already carries the
    /// states of plugins registered earlier.
    fn apply(
        &self,
        _tr: &Transaction,
        value: &PluginState,
        _old: &EditorState,
        _new: &EditorState,
    ) -> PluginState {
        value.clone()
    }

    /// Called with the transactions this plugin has not seen yet. A returned
    /// transaction is applied on top of `new` and offered to every plugin.
    fn append_transaction(
        &self,
        _trs: &[Transaction],
        _old: &EditorState,
        _new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError> {
        Ok(None)
    }

    /// Returning `false` vetoes the transaction.
    fn filter_transaction(
        &self,
        _tr: &Transaction,
        _state: &EditorState,
    ) -> Result<bool, PluginError> {
        Ok(true)
    }
}

/// Typed access to a plugin's state.
pub struct PluginKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> PluginKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get<'a>(&self, state: &'a EditorState) -> Option<&'a T> {
        state.plugin_state(self.name)?.downcast_ref::<T>()
    }
}

impl<T> Clone for PluginKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PluginKey<T> {}
