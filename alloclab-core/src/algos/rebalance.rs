//! Rebalance — the unit that turns temp targets into executed trades.

use super::Algo;
use crate::engine::{AlgoContext, EngineError};
use std::collections::BTreeMap;

/// Temp key holding fractional target weights (name → fraction of the
/// invoking node's value).
pub const WEIGHTS_KEY: &str = "weights";

/// Temp key holding absolute target values (name → value). Takes precedence
/// over `WEIGHTS_KEY` when both are present.
pub const TARGET_VALUES_KEY: &str = "target_values";

/// Tolerance on the weight sum before an over-allocation warning is emitted.
const OVERWEIGHT_TOLERANCE: f64 = 1e-9;

/// Read the target mapping from the invoking node's temp scope and drive the
/// rebalancer.
///
/// Contract: some earlier unit in the same pass must have written
/// `target_values` or `weights`. Invoking `Rebalance` without either is the
/// canonical `MissingKey` contract violation and halts the run.
pub struct Rebalance;

impl Algo for Rebalance {
    fn name(&self) -> &str {
        "rebalance"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        let targets = if ctx.temp_has(TARGET_VALUES_KEY) {
            ctx.temp_map(TARGET_VALUES_KEY)?.clone()
        } else {
            let weights = ctx.temp_map(WEIGHTS_KEY)?.clone();
            let total: f64 = weights.values().sum();
            if total > 1.0 + OVERWEIGHT_TOLERANCE {
                ctx.warn(format!(
                    "{} {}: target weights sum to {total:.4}, allocating beyond value",
                    ctx.date(),
                    ctx.node_path(),
                ));
            }
            let value = ctx.value();
            weights
                .into_iter()
                .map(|(name, weight)| (name, weight * value))
                .collect::<BTreeMap<String, f64>>()
        };

        ctx.rebalance(&targets)?;
        Ok(true)
    }
}
