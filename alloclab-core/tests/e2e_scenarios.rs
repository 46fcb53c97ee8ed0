//! End-to-end backtests over the public API: set-and-hold, explicit close,
//! Or-gated branch selection, and contract-violation halting.

use alloclab_core::algos::{
    AlgoStack, Annotate, Or, Rebalance, RunMonthly, RunOnce, RunWeekly, SetTargetValues,
    SetWeights,
};
use alloclab_core::data::InMemoryFeed;
use alloclab_core::domain::{InstrumentSpec, TradeKind, Tree};
use alloclab_core::engine::{Backtest, ChainSet, EngineError, RunConfig, RunOutcome};
use chrono::NaiveDate;

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

fn backtest(tree: Tree, chains: ChainSet, dates: Vec<NaiveDate>) -> Backtest {
    let feed = flat_feed(&dates);
    Backtest::new(tree, chains, Box::new(feed), dates, RunConfig::new(100_000.0)).unwrap()
}

/// Scenario: weights {A: 0.6, B: 0.4}, flat prices, three dates, rebalance
/// gated off after the first date. Positions set once, value flat afterward,
/// one trade per instrument.
#[test]
fn set_and_hold_three_dates() {
    let dates = vec![d(2024, 1, 2), d(2024, 1, 3), d(2024, 1, 4)];
    let tree = two_instrument_tree();
    let mut chains = ChainSet::new();
    chains.insert(
        tree.root(),
        AlgoStack::new(vec![
            Box::new(RunOnce::new()),
            Box::new(SetWeights::from_pairs(&[("A", 0.6), ("B", 0.4)])),
            Box::new(Rebalance),
        ]),
    );

    let report = backtest(tree, chains, dates.clone()).run();

    assert!(report.outcome.is_completed());
    assert_eq!(report.last_completed, Some(d(2024, 1, 4)));

    // Exactly one trade per instrument, all on the first date.
    assert_eq!(report.trades.len(), 2);
    for trade in &report.trades {
        assert_eq!(trade.date, d(2024, 1, 2));
        assert_eq!(trade.kind, TradeKind::Open);
    }
    assert_eq!(report.trades[0].instrument, "A");
    assert_eq!(report.trades[0].quantity_delta, 6_000.0);
    assert_eq!(report.trades[1].instrument, "B");
    assert_eq!(report.trades[1].quantity_delta, 2_000.0);

    // Value unchanged across all three dates; weights hold at 0.6/0.4.
    for snapshot in &report.snapshots {
        assert!((snapshot.root_value() - 100_000.0).abs() < 1e-9);
    }
    let last = report.snapshots.last().unwrap();
    assert!((last.node("root/A").unwrap().weight - 0.6).abs() < 1e-9);
    assert!((last.node("root/B").unwrap().weight - 0.4).abs() < 1e-9);
    assert!((last.node("root").unwrap().cash.unwrap()).abs() < 1e-9);
    assert_eq!(last.node("root/A").unwrap().quantity, Some(6_000.0));
}

/// Scenario: a target mapping of {A: 0} against a long position emits one
/// full-close trade for A; instruments not named trade nothing.
#[test]
fn explicit_zero_target_closes_only_the_named_position() {
    let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
    let tree = two_instrument_tree();
    let mut chains = ChainSet::new();
    chains.insert(
        tree.root(),
        AlgoStack::new(vec![Box::new(Or::new(vec![
            Box::new(AlgoStack::new(vec![
                Box::new(RunOnce::new()),
                Box::new(SetTargetValues::from_pairs(&[("A", 60_000.0)])),
                Box::new(Rebalance),
            ])),
            Box::new(AlgoStack::new(vec![
                Box::new(SetTargetValues::from_pairs(&[("A", 0.0)])),
                Box::new(Rebalance),
            ])),
        ]))]),
    );

    let report = backtest(tree, chains, dates).run();
    assert!(report.outcome.is_completed());

    // Date 1 opens A; date 2 closes it. B never trades despite its implicit
    // zero target — it was already flat.
    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.trades[0].instrument, "A");
    assert_eq!(report.trades[0].kind, TradeKind::Open);
    assert_eq!(report.trades[1].instrument, "A");
    assert_eq!(report.trades[1].kind, TradeKind::Close);
    assert_eq!(report.trades[1].quantity_delta, -6_000.0);

    let last = report.snapshots.last().unwrap();
    assert_eq!(last.node("root/A").unwrap().quantity, Some(0.0));
    assert_eq!(last.node("root/B").unwrap().quantity, Some(0.0));
    assert!((last.node("root").unwrap().cash.unwrap() - 100_000.0).abs() < 1e-9);
}

/// Scenario: Or with a weekly logging branch and a monthly trading branch.
/// On a new week the logging branch runs and the trading branch is never
/// consulted; on a new month (same week) the logging gate yields false and
/// the trading branch executes.
#[test]
fn or_selects_weekly_logging_then_monthly_trading() {
    // Tue Jan 2 (W01), Mon Jan 8 (W02), Mon Jan 29 (W05), Thu Feb 1 (W05).
    let dates = vec![d(2024, 1, 2), d(2024, 1, 8), d(2024, 1, 29), d(2024, 2, 1)];
    let tree = two_instrument_tree();
    let mut chains = ChainSet::new();
    chains.insert(
        tree.root(),
        AlgoStack::new(vec![Box::new(Or::new(vec![
            Box::new(AlgoStack::named(
                "weekly-logging",
                vec![
                    Box::new(RunWeekly::skip_first()),
                    Box::new(Annotate::new("weekly check")),
                ],
            )),
            Box::new(AlgoStack::named(
                "monthly-trading",
                vec![
                    Box::new(RunMonthly::skip_first()),
                    Box::new(SetWeights::from_pairs(&[("A", 0.6), ("B", 0.4)])),
                    Box::new(Rebalance),
                ],
            )),
        ]))]),
    );

    let report = backtest(tree, chains, dates).run();
    assert!(report.outcome.is_completed());

    // Logging branch fired on the two week boundaries only.
    assert_eq!(report.notes.len(), 2);
    assert!(report.notes[0].starts_with("2024-01-08"));
    assert!(report.notes[1].starts_with("2024-01-29"));

    // Trading branch fired once, on the month boundary.
    assert_eq!(report.trades.len(), 2);
    for trade in &report.trades {
        assert_eq!(trade.date, d(2024, 2, 1));
    }

    // Root chain outcome per date: neither branch, logging, logging, trading.
    let decisions: Vec<bool> = report.snapshots.iter().map(|s| s.root_decision).collect();
    assert_eq!(decisions, vec![false, true, true, true]);
}

/// Invoking `Rebalance` with no target mapping in temp is a contract
/// violation between units: the run halts with `MissingKey` naming the node,
/// and no partial history is recorded for the failing date.
#[test]
fn missing_weights_key_halts_the_run() {
    let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
    let tree = two_instrument_tree();
    let mut chains = ChainSet::new();
    chains.insert(tree.root(), AlgoStack::new(vec![Box::new(Rebalance)]));

    let report = backtest(tree, chains, dates).run();

    assert!(report.snapshots.is_empty());
    assert!(report.trades.is_empty());
    assert_eq!(report.last_completed, None);
    match &report.outcome {
        RunOutcome::Halted { date, node, error } => {
            assert_eq!(*date, d(2024, 1, 2));
            assert_eq!(node, "root");
            match error {
                EngineError::MissingKey { node, key, .. } => {
                    assert_eq!(node, "root");
                    assert_eq!(key, "weights");
                }
                other => panic!("expected MissingKey, got {other:?}"),
            }
        }
        other => panic!("expected halt, got {other:?}"),
    }
}

/// Nested strategy-of-strategies: the root allocates to a sub-strategy, whose
/// own chain invests the allocation the same date. Conservation holds at
/// every level.
#[test]
fn nested_strategy_invests_its_allocation() {
    let dates = vec![d(2024, 1, 2), d(2024, 1, 3)];
    let mut tree = Tree::new("root");
    tree.add_instrument(tree.root(), "A", InstrumentSpec::continuous())
        .unwrap();
    let bonds = tree.add_strategy(tree.root(), "bonds").unwrap();
    tree.add_instrument(bonds, "B", InstrumentSpec::continuous())
        .unwrap();

    let mut chains = ChainSet::new();
    chains.insert(
        tree.root(),
        AlgoStack::new(vec![
            Box::new(SetWeights::from_pairs(&[("A", 0.5), ("bonds", 0.5)])),
            Box::new(Rebalance),
        ]),
    );
    chains.insert(
        bonds,
        AlgoStack::new(vec![
            Box::new(SetWeights::from_pairs(&[("B", 1.0)])),
            Box::new(Rebalance),
        ]),
    );

    let report = backtest(tree, chains, dates).run();
    assert!(report.outcome.is_completed());

    let last = report.snapshots.last().unwrap();
    assert!((last.root_value() - 100_000.0).abs() < 1e-6);

    // Root: half in A, half through the sub-strategy.
    assert!((last.node("root/A").unwrap().value - 50_000.0).abs() < 1e-6);
    let bonds_snap = last.node("root/bonds").unwrap();
    assert!((bonds_snap.value - 50_000.0).abs() < 1e-6);
    assert!((bonds_snap.weight - 0.5).abs() < 1e-9);

    // Sub-strategy is fully invested in B.
    assert!((last.node("root/bonds/B").unwrap().value - 50_000.0).abs() < 1e-6);
    assert!((bonds_snap.cash.unwrap()).abs() < 1e-6);

    // Conservation at both levels.
    let root_snap = last.node("root").unwrap();
    let root_children =
        last.node("root/A").unwrap().value + bonds_snap.value + root_snap.cash.unwrap();
    assert!((root_snap.value - root_children).abs() < 1e-6);
}
