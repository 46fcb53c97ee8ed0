//! AlgoContext — the capability handle a decision unit receives.
//!
//! A unit gets read access to the whole tree but mutation only of its own
//! node's temp/perm scopes (plus trade execution through the rebalancer).
//! Mutating sibling state is simply not expressible through this API; that is
//! how the "units touch only their own scope" convention is kept honest
//! without runtime checks.

use crate::data::DataFeed;
use crate::domain::instrument::InstrumentSpec;
use crate::domain::state::{Scope, StateError, StateValue};
use crate::domain::trade::TradeRecord;
use crate::domain::tree::{NodeId, Tree};
use crate::engine::error::EngineError;
use crate::engine::rebalance;
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub struct AlgoContext<'a> {
    tree: &'a mut Tree,
    node: NodeId,
    date: NaiveDate,
    feed: &'a dyn DataFeed,
    catalog: &'a BTreeMap<String, InstrumentSpec>,
    trades: &'a mut Vec<TradeRecord>,
    notes: &'a mut Vec<String>,
    warnings: &'a mut Vec<String>,
}

impl<'a> AlgoContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        tree: &'a mut Tree,
        node: NodeId,
        date: NaiveDate,
        feed: &'a dyn DataFeed,
        catalog: &'a BTreeMap<String, InstrumentSpec>,
        trades: &'a mut Vec<TradeRecord>,
        notes: &'a mut Vec<String>,
        warnings: &'a mut Vec<String>,
    ) -> Self {
        Self {
            tree,
            node,
            date,
            feed,
            catalog,
            trades,
            notes,
            warnings,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn node_id(&self) -> NodeId {
        self.node
    }

    pub fn node_name(&self) -> &str {
        &self.tree.node(self.node).name
    }

    pub fn node_path(&self) -> String {
        self.tree.path(self.node)
    }

    /// Current aggregated value of the invoking node.
    pub fn value(&self) -> f64 {
        self.tree.node(self.node).value
    }

    /// Read-only traversal handle over the whole tree.
    pub fn tree(&self) -> &Tree {
        self.tree
    }

    // ─── Scoped state on the invoking node ───

    pub fn temp_get(&self, key: &str) -> Result<&StateValue, EngineError> {
        self.state_get(Scope::Temp, key)
    }

    pub fn perm_get(&self, key: &str) -> Result<&StateValue, EngineError> {
        self.state_get(Scope::Perm, key)
    }

    pub fn temp_set(&mut self, key: impl Into<String>, value: StateValue) {
        self.tree
            .node_mut(self.node)
            .state
            .set(Scope::Temp, key, value);
    }

    pub fn perm_set(&mut self, key: impl Into<String>, value: StateValue) {
        self.tree
            .node_mut(self.node)
            .state
            .set(Scope::Perm, key, value);
    }

    pub fn temp_has(&self, key: &str) -> bool {
        self.tree.node(self.node).state.has(Scope::Temp, key)
    }

    pub fn perm_has(&self, key: &str) -> bool {
        self.tree.node(self.node).state.has(Scope::Perm, key)
    }

    /// Non-erroring perm lookup, for units that treat absence as "first time".
    pub fn try_perm(&self, key: &str) -> Option<&StateValue> {
        self.tree.node(self.node).state.try_get(Scope::Perm, key)
    }

    /// Typed read of a name-keyed numeric map (target weights/values).
    pub fn temp_map(&self, key: &str) -> Result<&BTreeMap<String, f64>, EngineError> {
        let value = self.temp_get(key)?;
        value.as_map().ok_or_else(|| EngineError::TypeMismatch {
            node: self.node_path(),
            key: key.to_string(),
            expected: "map",
            actual: value.type_name(),
        })
    }

    fn state_get(&self, scope: Scope, key: &str) -> Result<&StateValue, EngineError> {
        self.tree
            .node(self.node)
            .state
            .get(scope, key)
            .map_err(|e| self.lift(e))
    }

    fn lift(&self, err: StateError) -> EngineError {
        let node = self.node_path();
        match err {
            StateError::MissingKey { scope, key } => EngineError::MissingKey { node, scope, key },
            StateError::TypeMismatch {
                key,
                expected,
                actual,
            } => EngineError::TypeMismatch {
                node,
                key,
                expected,
                actual,
            },
        }
    }

    // ─── Side channels ───

    /// Named auxiliary series registered with the feed at setup.
    pub fn auxiliary(&self, key: &str) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.feed.auxiliary(key)
    }

    /// Emit a dated note into the run report.
    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    /// Emit a warning into the run report.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    // ─── Trading ───

    /// Move the invoking node's children toward the given absolute target
    /// values (name → value). See `engine::rebalance` for the algorithm.
    pub fn rebalance(&mut self, targets: &BTreeMap<String, f64>) -> Result<(), EngineError> {
        rebalance::execute(
            self.tree,
            self.node,
            self.date,
            self.feed,
            self.catalog,
            targets,
            self.trades,
        )
    }
}
