//! Periodicity gates — the leading "should I run today" units.
//!
//! A gate placed at the head of a stack turns the whole stack into a
//! conditionally-run branch: the gate's `false` short-circuits the stack,
//! which inside an `Or` makes the combinator try the next alternative.
//!
//! Period gates remember the last period they saw in the invoking node's
//! perm scope and fire when the period changes. The memory updates on every
//! invocation, fire or not, so a gate that is consulted daily fires exactly
//! once per period.

use super::Algo;
use crate::domain::state::StateValue;
use crate::engine::{AlgoContext, EngineError};
use chrono::{Datelike, NaiveDate};

/// Fires on its first invocation, never again. Perm-scoped, so the latch is
/// per node, not per unit instance.
pub struct RunOnce {
    key: String,
}

impl RunOnce {
    pub fn new() -> Self {
        Self {
            key: "run_once.fired".into(),
        }
    }

    /// Custom perm key, for chains that carry more than one `RunOnce`.
    pub fn keyed(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for RunOnce {
    fn default() -> Self {
        Self::new()
    }
}

impl Algo for RunOnce {
    fn name(&self) -> &str {
        "run_once"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        if ctx.perm_has(&self.key) {
            return Ok(false);
        }
        ctx.perm_set(self.key.clone(), StateValue::Bool(true));
        Ok(true)
    }
}

/// Always fires. Useful as the explicit head of an every-date branch.
pub struct RunDaily;

impl Algo for RunDaily {
    fn name(&self) -> &str {
        "run_daily"
    }

    fn invoke(&self, _ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        Ok(true)
    }
}

/// Fires on the first date of each ISO week it observes.
pub struct RunWeekly {
    pub run_on_first_date: bool,
}

impl RunWeekly {
    pub fn new() -> Self {
        Self {
            run_on_first_date: true,
        }
    }

    pub fn skip_first() -> Self {
        Self {
            run_on_first_date: false,
        }
    }
}

impl Default for RunWeekly {
    fn default() -> Self {
        Self::new()
    }
}

impl Algo for RunWeekly {
    fn name(&self) -> &str {
        "run_weekly"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        let week = ctx.date().iso_week();
        let current = format!("{}-W{:02}", week.year(), week.week());
        fire_on_period_change(ctx, "run_weekly.last", current, self.run_on_first_date)
    }
}

/// Fires on the first date of each calendar month it observes.
pub struct RunMonthly {
    pub run_on_first_date: bool,
}

impl RunMonthly {
    pub fn new() -> Self {
        Self {
            run_on_first_date: true,
        }
    }

    pub fn skip_first() -> Self {
        Self {
            run_on_first_date: false,
        }
    }
}

impl Default for RunMonthly {
    fn default() -> Self {
        Self::new()
    }
}

impl Algo for RunMonthly {
    fn name(&self) -> &str {
        "run_monthly"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        let date = ctx.date();
        let current = format!("{}-{:02}", date.year(), date.month());
        fire_on_period_change(ctx, "run_monthly.last", current, self.run_on_first_date)
    }
}

/// Fires on every date at or after the configured threshold.
pub struct RunAfterDate {
    pub date: NaiveDate,
}

impl RunAfterDate {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl Algo for RunAfterDate {
    fn name(&self) -> &str {
        "run_after_date"
    }

    fn invoke(&self, ctx: &mut AlgoContext<'_>) -> Result<bool, EngineError> {
        Ok(ctx.date() >= self.date)
    }
}

fn fire_on_period_change(
    ctx: &mut AlgoContext<'_>,
    key: &str,
    current: String,
    run_on_first_date: bool,
) -> Result<bool, EngineError> {
    let previous = ctx
        .try_perm(key)
        .and_then(|v| v.as_text())
        .map(str::to_owned);
    ctx.perm_set(key.to_string(), StateValue::Text(current.clone()));
    Ok(match previous {
        None => run_on_first_date,
        Some(prev) => prev != current,
    })
}
