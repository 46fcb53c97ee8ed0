//! Decision units and their composition.
//!
//! An `Algo` is one step of a strategy node's decision chain: invoked with
//! the node's full tree context, it returns a boolean continuation signal and
//! may read/write the node's temp/perm scopes as a side effect.
//!
//! Composition is two combinators:
//! - `AlgoStack` — AND with short-circuit: the first `false` stops the stack.
//! - `Or` — OR with short-circuit: the first `true` stops the alternatives.
//!
//! Both satisfy the `Algo` contract themselves, so pipelines nest to any
//! depth. Errors are categorically distinct from `false`: neither combinator
//! catches them, they propagate to the clock and halt the run.

pub mod annotate;
pub mod gates;
pub mod rebalance;
pub mod weights;

pub use annotate::Annotate;
pub use gates::{RunAfterDate, RunDaily, RunMonthly, RunOnce, RunWeekly};
pub use rebalance::Rebalance;
pub use weights::{SetTargetValues, SetWeights};

use crate::engine::{AlgoContext, EngineError};

/// A single decision/side-effect unit in a strategy's execution pipeline.
///
/// Units are stateless or carry constructor-bound configuration; memory that
/// must survive across dates belongs in the invoking node's perm scope, which
/// is what keeps one unit instance reusable across nodes.
pub trait Algo: Send + Sync {
    /// Stable identifier, for diagnostics.
    fn name(&self) -> &str;

    /// Run one step. `Ok(false)` stops the enclosing stack for this date;
    /// `Err` halts the run.
    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError>;
}

/// AND-composed ordered sequence: stops at the first `false`.
///
/// An empty stack is vacuously `true`.
pub struct AlgoStack {
    name: String,
    units: Vec<Box<dyn Algo>>,
}

impl AlgoStack {
    pub fn new(units: Vec<Box<dyn Algo>>) -> Self {
        Self::named("stack", units)
    }

    pub fn named(name: impl Into<String>, units: Vec<Box<dyn Algo>>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn push(&mut self, unit: Box<dyn Algo>) {
        self.units.push(unit);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl Algo for AlgoStack {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        for unit in &self.units {
            if !unit.invoke(ctx)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// OR-composed ordered sequence: stops at the first `true`.
///
/// The sole branching primitive — each alternative is typically a stack led
/// by its own "should I run today" gate. An empty `Or` is vacuously `false`.
pub struct Or {
    name: String,
    units: Vec<Box<dyn Algo>>,
}

impl Or {
    pub fn new(units: Vec<Box<dyn Algo>>) -> Self {
        Self::named("any", units)
    }

    pub fn named(name: impl Into<String>, units: Vec<Box<dyn Algo>>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }
}

impl Algo for Or {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        for unit in &self.units {
            if unit.invoke(ctx)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
