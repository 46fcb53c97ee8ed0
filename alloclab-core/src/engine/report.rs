//! Run result types: outcome, report, and the determinism digest.

use crate::domain::ids::{hash_canonical, ReportDigest};
use crate::domain::snapshot::DateSnapshot;
use crate::domain::trade::TradeRecord;
use crate::engine::error::EngineError;
use chrono::NaiveDate;
use serde::Serialize;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every configured date completed.
    Completed,
    /// Cancelled between dates; `at` is the first date that did not run.
    Aborted { at: NaiveDate },
    /// A date's pass raised an unrecoverable error. All prior dates'
    /// snapshots are preserved; the failing date left no partial history.
    Halted {
        date: NaiveDate,
        node: String,
        error: EngineError,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed)
    }
}

/// Accumulated result of a backtest run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One full-tree snapshot per completed date, in date order.
    pub snapshots: Vec<DateSnapshot>,
    /// Every trade the rebalancer executed, in execution order.
    pub trades: Vec<TradeRecord>,
    /// Messages emitted by decision units (`Annotate` and friends).
    pub notes: Vec<String>,
    /// Engine-detected oddities, e.g. target weights summing above 1.0.
    pub warnings: Vec<String>,
    /// Last date whose pass fully completed.
    pub last_completed: Option<NaiveDate>,
    pub outcome: RunOutcome,
}

/// Canonical payload for the report digest.
#[derive(Serialize)]
struct DigestPayload<'a> {
    trades: &'a [TradeRecord],
    snapshots: &'a [DateSnapshot],
}

impl RunReport {
    /// BLAKE3 digest over the trade log and snapshots. Two runs with
    /// identical tree description, feed, and date sequence produce equal
    /// digests — the handle the determinism tests grab.
    pub fn digest(&self) -> ReportDigest {
        ReportDigest(hash_canonical(&DigestPayload {
            trades: &self.trades,
            snapshots: &self.snapshots,
        }))
    }

    /// Root value at each completed date.
    pub fn value_curve(&self) -> Vec<(NaiveDate, f64)> {
        self.snapshots
            .iter()
            .map(|s| (s.date, s.root_value()))
            .collect()
    }

    /// Root value after the last completed date.
    pub fn final_value(&self) -> Option<f64> {
        self.snapshots.last().map(|s| s.root_value())
    }
}
