//! Target-setting units: write the mapping a downstream `Rebalance` consumes.

use super::rebalance::{TARGET_VALUES_KEY, WEIGHTS_KEY};
use super::Algo;
use crate::domain::state::StateValue;
use crate::engine::{AlgoContext, EngineError};
use std::collections::BTreeMap;

/// Write a fixed name → fraction-of-value map to the temp `weights` key.
///
/// Weights are fractions of the invoking node's current value; they need not
/// sum to 1.0 — under-allocation leaves cash, over-allocation is leverage
/// (flagged as a warning by `Rebalance`).
pub struct SetWeights {
    weights: BTreeMap<String, f64>,
}

impl SetWeights {
    pub fn new(weights: BTreeMap<String, f64>) -> Self {
        Self { weights }
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self::new(pairs.iter().map(|(n, w)| (n.to_string(), *w)).collect())
    }
}

impl Algo for SetWeights {
    fn name(&self) -> &str {
        "set_weights"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        ctx.temp_set(WEIGHTS_KEY, StateValue::Map(self.weights.clone()));
        Ok(true)
    }
}

/// Write fixed absolute name → value targets to the temp `target_values` key.
pub struct SetTargetValues {
    targets: BTreeMap<String, f64>,
}

impl SetTargetValues {
    pub fn new(targets: BTreeMap<String, f64>) -> Self {
        Self { targets }
    }

    pub fn from_pairs(pairs: &[(&str, f64)]) -> Self {
        Self::new(pairs.iter().map(|(n, v)| (n.to_string(), *v)).collect())
    }
}

impl Algo for SetTargetValues {
    fn name(&self) -> &str {
        "set_target_values"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        ctx.temp_set(TARGET_VALUES_KEY, StateValue::Map(self.targets.clone()));
        Ok(true)
    }
}
