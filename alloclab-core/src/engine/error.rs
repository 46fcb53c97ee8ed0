//! Engine-level error taxonomy.
//!
//! All variants are non-retryable for the affected date: the engine is
//! deterministic, so retrying identical inputs cannot change the outcome.
//! Combinators never catch these — only `false` is a control signal; an error
//! aborts the current date and halts the run with prior history preserved.

use crate::data::FeedError;
use crate::domain::state::Scope;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// A decision unit read a scoped-state key nobody wrote — a contract
    /// violation between units, surfaced at run time by design.
    #[error("node '{node}': missing key '{key}' in {scope} scope")]
    MissingKey {
        node: String,
        scope: Scope,
        key: String,
    },

    /// A scoped-state key held a different payload type than the reader expected.
    #[error("node '{node}': key '{key}' holds {actual}, expected {expected}")]
    TypeMismatch {
        node: String,
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A rebalance target names an instrument the data feed does not know.
    #[error("unknown instrument '{name}'")]
    UnknownInstrument { name: String },

    /// A rebalance target violates the named instrument's own policy.
    #[error("invalid target for '{name}' under '{node}': {reason}")]
    InvalidTarget {
        node: String,
        name: String,
        reason: String,
    },

    /// The feed has no price for an instrument on the current date.
    #[error("no price for '{name}' on {date}")]
    StaleOrMissingPrice { name: String, date: NaiveDate },

    /// The configured date sequence is not strictly increasing.
    #[error("invalid date sequence at position {position}: {date} does not advance")]
    InvalidDateSequence { position: usize, date: NaiveDate },
}

impl From<FeedError> for EngineError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::UnknownInstrument { name } => EngineError::UnknownInstrument { name },
            FeedError::MissingPrice { name, date } => {
                EngineError::StaleOrMissingPrice { name, date }
            }
        }
    }
}
