//! Simulation clock — the date-stepping state machine.
//!
//! `Initializing → Stepping(date) → Finalizing`. Each date runs five phases:
//!
//! 0. Cancellation check — before any mutation, so an abort between dates
//!    never leaves partial writes.
//! 1. Bottom-up update: leaf prices from the feed, coupon accrual, value
//!    aggregation and weight computation through every ancestor.
//! 2. Temp clear on every node.
//! 3. Decision chains, pre-order (root first, nested strategies after, each
//!    in insertion order). The root chain's boolean is recorded per date and
//!    never aborts the run; an *error* halts the run with the failing date's
//!    partial outputs discarded.
//! 4. Snapshot of every node into the run history.

use crate::algos::{Algo, AlgoStack};
use crate::data::DataFeed;
use crate::domain::instrument::InstrumentSpec;
use crate::domain::node::NodeKind;
use crate::domain::snapshot::{DateSnapshot, NodeSnapshot};
use crate::domain::trade::TradeRecord;
use crate::domain::tree::{NodeId, Tree};
use crate::engine::context::AlgoContext;
use crate::engine::error::EngineError;
use crate::engine::report::{RunOutcome, RunReport};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// Static configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Capital seeded into the root strategy at initialization.
    pub initial_capital: f64,
    /// Instrument metadata for positions the rebalancer may open, keyed by
    /// instrument name. Unlisted names fall back to `InstrumentSpec::default()`.
    pub catalog: BTreeMap<String, InstrumentSpec>,
}

impl RunConfig {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            catalog: BTreeMap::new(),
        }
    }

    pub fn with_catalog(mut self, catalog: BTreeMap<String, InstrumentSpec>) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Decision chains awaiting attachment, keyed by strategy node.
#[derive(Default)]
pub struct ChainSet {
    chains: HashMap<NodeId, AlgoStack>,
}

impl ChainSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a chain to a strategy node. Re-inserting replaces.
    pub fn insert(&mut self, node: NodeId, chain: AlgoStack) {
        self.chains.insert(node, chain);
    }
}

/// A fully assembled backtest, ready to run once.
pub struct Backtest {
    tree: Tree,
    /// Chains in strategy pre-order; parent chains run before child chains.
    chains: Vec<(NodeId, AlgoStack)>,
    feed: Box<dyn DataFeed>,
    dates: Vec<NaiveDate>,
    config: RunConfig,
}

impl std::fmt::Debug for Backtest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtest")
            .field("tree", &self.tree)
            .field("chains", &self.chains.len())
            .field("feed", &"<dyn DataFeed>")
            .field("dates", &self.dates)
            .field("config", &self.config)
            .finish()
    }
}

impl Backtest {
    /// Initializing: validate the date sequence, order the chains, seed the
    /// root's capital.
    pub fn new(
        mut tree: Tree,
        mut chains: ChainSet,
        feed: Box<dyn DataFeed>,
        dates: Vec<NaiveDate>,
        config: RunConfig,
    ) -> Result<Self, EngineError> {
        for (i, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(EngineError::InvalidDateSequence {
                    position: i + 1,
                    date: pair[1],
                });
            }
        }

        let ordered: Vec<(NodeId, AlgoStack)> = tree
            .strategies_pre_order()
            .into_iter()
            .filter_map(|id| chains.chains.remove(&id).map(|stack| (id, stack)))
            .collect();

        let root = tree.root();
        if let NodeKind::Strategy(s) = &mut tree.node_mut(root).kind {
            s.cash = config.initial_capital;
        }
        tree.aggregate_values();

        Ok(Self {
            tree,
            chains: ordered,
            feed,
            dates,
            config,
        })
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Run to completion (or halt). Consumes the tree state; a `Backtest` is
    /// good for exactly one run.
    pub fn run(&mut self) -> RunReport {
        self.run_with_cancel(&AtomicBool::new(false))
    }

    /// Run with a cancellation flag, checked once per Stepping transition —
    /// before the date's first mutation, so prior history stays intact and
    /// the aborted date leaves no partial writes.
    pub fn run_with_cancel(&mut self, cancel: &AtomicBool) -> RunReport {
        let mut snapshots: Vec<DateSnapshot> = Vec::with_capacity(self.dates.len());
        let mut trades: Vec<TradeRecord> = Vec::new();
        let mut notes: Vec<String> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        let mut outcome = RunOutcome::Completed;

        let dates = self.dates.clone();
        let root = self.tree.root();

        'stepping: for &date in &dates {
            if cancel.load(Ordering::Relaxed) {
                outcome = RunOutcome::Aborted { at: date };
                break;
            }

            // Marks for discarding the failing date's partial outputs.
            let trades_mark = trades.len();
            let notes_mark = notes.len();
            let warnings_mark = warnings.len();

            // ─── Phase 1: bottom-up update ───
            if let Err((node, error)) = self.update_values(date) {
                outcome = RunOutcome::Halted { date, node, error };
                break;
            }

            // ─── Phase 2: temp clear ───
            self.tree.clear_temp_all();

            // ─── Phase 3: decision chains, pre-order ───
            let mut root_decision = true;
            for (id, stack) in &self.chains {
                let result = {
                    let mut ctx = AlgoContext::new(
                        &mut self.tree,
                        *id,
                        date,
                        self.feed.as_ref(),
                        &self.config.catalog,
                        &mut trades,
                        &mut notes,
                        &mut warnings,
                    );
                    stack.invoke(&mut ctx)
                };
                match result {
                    Ok(flag) => {
                        if *id == root {
                            root_decision = flag;
                        }
                    }
                    Err(error) => {
                        trades.truncate(trades_mark);
                        notes.truncate(notes_mark);
                        warnings.truncate(warnings_mark);
                        outcome = RunOutcome::Halted {
                            date,
                            node: self.tree.path(*id),
                            error,
                        };
                        break 'stepping;
                    }
                }
            }

            // ─── Phase 4: snapshot ───
            // Re-aggregate first so trades executed this pass are reflected.
            self.tree.aggregate_values();
            snapshots.push(self.snapshot(date, root_decision));
        }

        // ─── Finalizing ───
        let last_completed = snapshots.last().map(|s| s.date);
        RunReport {
            snapshots,
            trades,
            notes,
            warnings,
            last_completed,
            outcome,
        }
    }

    /// Leaf price updates + coupon accrual, then full value/weight
    /// aggregation. Errors carry the failing node's path.
    fn update_values(&mut self, date: NaiveDate) -> Result<(), (String, EngineError)> {
        for id in self.tree.post_order() {
            if !self.tree.node(id).kind.is_instrument() {
                continue;
            }
            let name = self.tree.node(id).name.clone();
            let price = self
                .feed
                .price_at(&name, date)
                .map_err(|e| (self.tree.path(id), EngineError::from(e)))?;
            if let NodeKind::Instrument(inst) = &mut self.tree.node_mut(id).kind {
                inst.price = price;
                inst.accrued_coupon += inst.quantity * inst.spec.coupon_rate;
            }
        }
        self.tree.aggregate_values();
        Ok(())
    }

    fn snapshot(&self, date: NaiveDate, root_decision: bool) -> DateSnapshot {
        let nodes = self
            .tree
            .pre_order()
            .into_iter()
            .map(|id| {
                let node = self.tree.node(id);
                let (quantity, cash) = match &node.kind {
                    NodeKind::Instrument(inst) => (Some(inst.quantity), None),
                    NodeKind::Strategy(s) => (None, Some(s.cash)),
                };
                NodeSnapshot {
                    path: self.tree.path(id),
                    value: node.value,
                    weight: node.weight,
                    quantity,
                    cash,
                }
            })
            .collect();
        DateSnapshot {
            date,
            root_decision,
            nodes,
        }
    }
}

/// Run independent backtests in parallel, one owned tree per run.
///
/// This is the only place the engine touches parallelism: nothing is shared
/// across runs, so each run stays strictly sequential internally.
pub fn run_many(backtests: Vec<Backtest>) -> Vec<RunReport> {
    backtests
        .into_par_iter()
        .map(|mut backtest| backtest.run())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algos::weights::SetWeights;
    use crate::algos::{gates::RunOnce, rebalance::Rebalance};
    use crate::data::InMemoryFeed;
    use crate::domain::instrument::InstrumentSpec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn flat_feed(dates: &[NaiveDate]) -> InMemoryFeed {
        InMemoryFeed::new()
            .with_series("A", dates.iter().map(|&dt| (dt, 10.0)))
            .with_series("B", dates.iter().map(|&dt| (dt, 20.0)))
    }

    fn two_instrument_tree() -> Tree {
        let mut tree = Tree::new("root");
        tree.add_instrument(tree.root(), "A", InstrumentSpec::continuous())
            .unwrap();
        tree.add_instrument(tree.root(), "B", InstrumentSpec::continuous())
            .unwrap();
        tree
    }

    fn buy_once_chain(tree: &Tree) -> ChainSet {
        let mut chains = ChainSet::new();
        chains.insert(
            tree.root(),
            AlgoStack::new(vec![
                Box::new(RunOnce::new()),
                Box::new(SetWeights::from_pairs(&[("A", 0.6), ("B", 0.4)])),
                Box::new(Rebalance),
            ]),
        );
        chains
    }

    #[test]
    fn rejects_non_increasing_dates() {
        let tree = two_instrument_tree();
        let dates = vec![d(2024, 1, 3), d(2024, 1, 2)];
        let err = Backtest::new(
            tree,
            ChainSet::new(),
            Box::new(flat_feed(&[])),
            dates,
            RunConfig::new(100_000.0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidDateSequence {
                position: 1,
                date: d(2024, 1, 2)
            }
        );
    }

    #[test]
    fn rejects_duplicate_dates() {
        let tree = two_instrument_tree();
        let dates = vec![d(2024, 1, 2), d(2024, 1, 2)];
        let err = Backtest::new(
            tree,
            ChainSet::new(),
            Box::new(flat_feed(&[])),
            dates,
            RunConfig::new(100_000.0),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDateSequence { .. }));
    }

    #[test]
    fn chainless_run_marks_values_and_holds_cash() {
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let tree = two_instrument_tree();
        let mut backtest = Backtest::new(
            tree,
            ChainSet::new(),
            Box::new(flat_feed(&dates)),
            dates,
            RunConfig::new(100_000.0),
        )
        .unwrap();

        let report = backtest.run();
        assert!(report.outcome.is_completed());
        assert_eq!(report.snapshots.len(), 2);
        assert!(report.trades.is_empty());
        assert_eq!(report.final_value(), Some(100_000.0));
        // No chain on the root still records a vacuous true.
        assert!(report.snapshots[0].root_decision);
    }

    #[test]
    fn buy_once_then_hold() {
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)];
        let tree = two_instrument_tree();
        let chains = buy_once_chain(&tree);
        let mut backtest = Backtest::new(
            tree,
            chains,
            Box::new(flat_feed(&dates)),
            dates,
            RunConfig::new(100_000.0),
        )
        .unwrap();

        let report = backtest.run();
        assert!(report.outcome.is_completed());
        assert_eq!(report.trades.len(), 2);
        assert!(report.snapshots[0].root_decision);
        // RunOnce gates the chain off after the first date.
        assert!(!report.snapshots[1].root_decision);
        assert!(!report.snapshots[2].root_decision);
        for snapshot in &report.snapshots {
            assert!((snapshot.root_value() - 100_000.0).abs() < 1e-9);
        }
    }

    #[test]
    fn missing_price_halts_and_preserves_history() {
        let good = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)];
        // Feed only covers the first two dates.
        let tree = two_instrument_tree();
        let chains = buy_once_chain(&tree);
        let mut backtest = Backtest::new(
            tree,
            chains,
            Box::new(flat_feed(&good)),
            dates,
            RunConfig::new(100_000.0),
        )
        .unwrap();

        let report = backtest.run();
        assert_eq!(report.snapshots.len(), 2);
        assert_eq!(report.last_completed, Some(d(2024, 1, 3)));
        match &report.outcome {
            RunOutcome::Halted { date, node, error } => {
                assert_eq!(*date, d(2024, 1, 4));
                assert_eq!(node, "root/A");
                assert!(matches!(error, EngineError::StaleOrMissingPrice { .. }));
            }
            other => panic!("expected halt, got {other:?}"),
        }
    }

    #[test]
    fn pre_set_cancel_aborts_before_any_mutation() {
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let tree = two_instrument_tree();
        let chains = buy_once_chain(&tree);
        let mut backtest = Backtest::new(
            tree,
            chains,
            Box::new(flat_feed(&dates)),
            dates,
            RunConfig::new(100_000.0),
        )
        .unwrap();

        let cancel = AtomicBool::new(true);
        let report = backtest.run_with_cancel(&cancel);
        assert!(report.snapshots.is_empty());
        assert!(report.trades.is_empty());
        assert_eq!(report.last_completed, None);
        assert_eq!(
            report.outcome,
            RunOutcome::Aborted { at: d(2024, 1, 2) }
        );
    }

    #[test]
    fn run_many_matches_sequential_runs() {
        let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
        let build = || {
            let tree = two_instrument_tree();
            let chains = buy_once_chain(&tree);
            Backtest::new(
                tree,
                chains,
                Box::new(flat_feed(&dates)),
                dates.clone(),
                RunConfig::new(100_000.0),
            )
            .unwrap()
        };

        let sequential = build().run();
        let reports = run_many(vec![build(), build(), build()]);
        assert_eq!(reports.len(), 3);
        for report in &reports {
            assert_eq!(report.digest(), sequential.digest());
        }
    }
}
