//! Rebalancer — converts absolute target values into the minimal trade set.
//!
//! Algorithm, per strategy node:
//! 1. Create instrument leaves for target names with no existing child
//!    (resolved against the feed; nonzero targets only).
//! 2. Every existing child *not* named in the targets gets an implicit zero
//!    target (full close); an already-flat child produces no trade.
//! 3. Deltas apply in stored insertion order; new children were appended in
//!    target-map (`BTreeMap`) order, so repeated runs are bit-reproducible.
//! 4. Buys execute at `price + spread/2`, sells at `price - spread/2`;
//!    accrued coupon pays into parent cash when a position fully closes.
//! 5. Residual unallocated value stays as parent cash.
//! 6. A raw target crossing zero collapses to a close-to-flat unless the
//!    target explicitly requests the opposite sign.

use crate::data::DataFeed;
use crate::domain::instrument::{InstrumentSpec, ShortPolicy};
use crate::domain::node::NodeKind;
use crate::domain::trade::{TradeKind, TradeRecord, TradeSide};
use crate::domain::tree::{NodeId, Tree};
use crate::engine::error::EngineError;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Quantity deltas below this are float dust, not trades. Keeps an
/// already-satisfied rebalance idempotent under continuous lot sizes.
const QTY_EPSILON: f64 = 1e-9;

/// Value deltas below this skip a strategy-child capital transfer.
const VALUE_EPSILON: f64 = 1e-9;

pub(crate) fn execute(
    tree: &mut Tree,
    node: NodeId,
    date: NaiveDate,
    feed: &dyn DataFeed,
    catalog: &BTreeMap<String, InstrumentSpec>,
    targets: &BTreeMap<String, f64>,
    trades: &mut Vec<TradeRecord>,
) -> Result<(), EngineError> {
    debug_assert!(tree.node(node).kind.is_strategy());
    let strategy_path = tree.path(node);

    // Step 1: open positions for names with no existing child.
    for (name, &target) in targets {
        if target == 0.0 || tree.child_named(node, name).is_some() {
            continue;
        }
        if !feed.has_instrument(name) {
            return Err(EngineError::UnknownInstrument { name: name.clone() });
        }
        let spec = catalog.get(name).cloned().unwrap_or_default();
        let price = feed.price_at(name, date)?;
        let child = tree
            .add_instrument(node, name, spec)
            .expect("rebalance target parent is a strategy node");
        if let NodeKind::Instrument(inst) = &mut tree.node_mut(child).kind {
            inst.price = price;
        }
    }

    // Steps 2–6: walk children in insertion order.
    let children = tree.children(node).to_vec();
    for child in children {
        let name = tree.node(child).name.clone();
        let target_value = targets.get(&name).copied().unwrap_or(0.0);

        if tree.node(child).kind.is_strategy() {
            allocate_to_strategy(tree, node, child, &strategy_path, &name, target_value)?;
        } else {
            trade_instrument(tree, node, child, &strategy_path, target_value, date, trades)?;
        }
    }

    // Keep this node's value consistent for any unit running later in the
    // same pass (spread costs and coupon payouts shift it).
    let child_sum: f64 = tree
        .children(node)
        .iter()
        .map(|&c| tree.node(c).value)
        .sum();
    let cash = tree
        .node(node)
        .kind
        .as_strategy()
        .expect("rebalance node is a strategy")
        .cash;
    tree.node_mut(node).value = cash + child_sum;

    Ok(())
}

/// Capital transfer to a nested strategy: cash moves, no trade is logged —
/// the child invests through its own decision chain.
fn allocate_to_strategy(
    tree: &mut Tree,
    parent: NodeId,
    child: NodeId,
    strategy_path: &str,
    name: &str,
    target_value: f64,
) -> Result<(), EngineError> {
    if target_value < 0.0 {
        return Err(EngineError::InvalidTarget {
            node: strategy_path.to_string(),
            name: name.to_string(),
            reason: "strategy children cannot take a negative target".into(),
        });
    }
    let delta = target_value - tree.node(child).value;
    if delta.abs() < VALUE_EPSILON {
        return Ok(());
    }
    if let NodeKind::Strategy(s) = &mut tree.node_mut(child).kind {
        s.cash += delta;
    }
    tree.node_mut(child).value += delta;
    if let NodeKind::Strategy(s) = &mut tree.node_mut(parent).kind {
        s.cash -= delta;
    }
    Ok(())
}

fn trade_instrument(
    tree: &mut Tree,
    parent: NodeId,
    child: NodeId,
    strategy_path: &str,
    target_value: f64,
    date: NaiveDate,
    trades: &mut Vec<TradeRecord>,
) -> Result<(), EngineError> {
    let (name, spec, price, quantity, accrued) = {
        let node = tree.node(child);
        let inst = node
            .kind
            .as_instrument()
            .expect("child is an instrument leaf");
        (
            node.name.clone(),
            inst.spec.clone(),
            inst.price,
            inst.quantity,
            inst.accrued_coupon,
        )
    };

    if quantity == 0.0 && target_value == 0.0 {
        return Ok(());
    }
    if !(price > 0.0) {
        return Err(EngineError::StaleOrMissingPrice { name, date });
    }
    if target_value < 0.0 && spec.shorting == ShortPolicy::Disallowed {
        return Err(EngineError::InvalidTarget {
            node: strategy_path.to_string(),
            name,
            reason: "shorting is disallowed for this instrument".into(),
        });
    }

    let mut qty_delta = if target_value == 0.0 {
        // Full close is exact, never lot-rounded: flat means flat.
        -quantity
    } else {
        spec.round_quantity(target_value / price - quantity)
    };

    // A raw crossing collapses to a close unless the target explicitly
    // requests the opposite-sign position.
    let raw_new_qty = quantity + qty_delta;
    if quantity != 0.0
        && raw_new_qty != 0.0
        && raw_new_qty.signum() != quantity.signum()
        && target_value.signum() == quantity.signum()
    {
        qty_delta = -quantity;
    }

    if qty_delta.abs() < QTY_EPSILON {
        return Ok(());
    }

    let new_qty = quantity + qty_delta;
    let side = if qty_delta > 0.0 {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    };
    let executed_price = spec.exec_price(price, side);
    let spread_cost = qty_delta.abs() * spec.half_spread();
    let closes = new_qty == 0.0;
    let coupon_paid = if closes { accrued } else { 0.0 };
    let cash_delta = -(qty_delta * executed_price) + coupon_paid;
    let kind = if quantity == 0.0 {
        TradeKind::Open
    } else if closes {
        TradeKind::Close
    } else {
        TradeKind::Resize
    };

    {
        let node = tree.node_mut(child);
        if let NodeKind::Instrument(inst) = &mut node.kind {
            inst.quantity = new_qty;
            if closes {
                inst.accrued_coupon = 0.0;
            }
            node.value = inst.market_value();
        }
    }
    if let NodeKind::Strategy(s) = &mut tree.node_mut(parent).kind {
        s.cash += cash_delta;
    }

    trades.push(TradeRecord {
        date,
        strategy: strategy_path.to_string(),
        instrument: name,
        side,
        kind,
        quantity_delta: qty_delta,
        executed_price,
        spread_cost,
        coupon_paid,
    });
    Ok(())
}
