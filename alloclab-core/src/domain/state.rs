//! Scoped per-node state — the data-sharing contract between decision units.
//!
//! Every node carries two key/value maps:
//! - `temp`: cleared by the clock once per node per date, before decision
//!   chains run. Used to pass data between units within a single date's pass.
//! - `perm`: never cleared by the engine. A unit's private memory across dates.
//!
//! The engine never pre-populates application keys and never validates that a
//! chain's read/write contract is self-consistent; a read of an absent key
//! surfaces as `MissingKey` at run time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which of the two scopes a key lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    Temp,
    Perm,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Temp => write!(f, "temp"),
            Scope::Perm => write!(f, "perm"),
        }
    }
}

/// Payload stored under a state key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    /// Name-keyed numeric map — target weights, target values, scores.
    /// `BTreeMap` so downstream iteration is deterministic.
    Map(BTreeMap<String, f64>),
}

impl StateValue {
    /// The variant name, for `TypeMismatch` reporting.
    pub fn type_name(&self) -> &'static str {
        match self {
            StateValue::Bool(_) => "bool",
            StateValue::Int(_) => "int",
            StateValue::Float(_) => "float",
            StateValue::Text(_) => "text",
            StateValue::Date(_) => "date",
            StateValue::Map(_) => "map",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            StateValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            StateValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            StateValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("missing key '{key}' in {scope} scope")]
    MissingKey { scope: Scope, key: String },

    #[error("key '{key}' holds {actual}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Per-node temp/perm store.
#[derive(Debug, Clone, Default)]
pub struct ScopedState {
    temp: BTreeMap<String, StateValue>,
    perm: BTreeMap<String, StateValue>,
}

impl ScopedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: Scope, key: &str) -> Result<&StateValue, StateError> {
        self.map(scope).get(key).ok_or_else(|| StateError::MissingKey {
            scope,
            key: key.to_string(),
        })
    }

    pub fn set(&mut self, scope: Scope, key: impl Into<String>, value: StateValue) {
        self.map_mut(scope).insert(key.into(), value);
    }

    pub fn has(&self, scope: Scope, key: &str) -> bool {
        self.map(scope).contains_key(key)
    }

    /// Non-erroring lookup, for units that treat absence as "first time".
    pub fn try_get(&self, scope: Scope, key: &str) -> Option<&StateValue> {
        self.map(scope).get(key)
    }

    /// Wipe the temp scope. Perm entries survive untouched.
    pub fn clear_temp(&mut self) {
        self.temp.clear();
    }

    fn map(&self, scope: Scope) -> &BTreeMap<String, StateValue> {
        match scope {
            Scope::Temp => &self.temp,
            Scope::Perm => &self.perm,
        }
    }

    fn map_mut(&mut self, scope: Scope) -> &mut BTreeMap<String, StateValue> {
        match scope {
            Scope::Temp => &mut self.temp,
            Scope::Perm => &mut self.perm,
        }
    }
}
