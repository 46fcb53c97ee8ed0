//! TradeRecord — one executed quantity delta, with full cost traceability.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    /// First units of a previously flat position.
    Open,
    /// Adjustment that leaves the position open.
    Resize,
    /// Position taken to exactly flat.
    Close,
}

/// One entry in the run's trade log, produced by the rebalancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    /// Path of the strategy node that ordered the trade.
    pub strategy: String,
    /// Name of the traded instrument leaf.
    pub instrument: String,
    pub side: TradeSide,
    pub kind: TradeKind,
    /// Signed quantity change.
    pub quantity_delta: f64,
    /// Price actually paid/received, spread included.
    pub executed_price: f64,
    /// Cost attributable to the bid/offer spread, always non-negative.
    pub spread_cost: f64,
    /// Accrued coupon paid out to the parent's cash on a full close.
    pub coupon_paid: f64,
}

impl TradeRecord {
    /// Signed cash value of the quantity change at the executed price.
    pub fn notional(&self) -> f64 {
        self.quantity_delta * self.executed_price
    }

    pub fn is_close(&self) -> bool {
        self.kind == TradeKind::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trade() -> TradeRecord {
        TradeRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            strategy: "root".into(),
            instrument: "A".into(),
            side: TradeSide::Buy,
            kind: TradeKind::Open,
            quantity_delta: 60.0,
            executed_price: 10.0,
            spread_cost: 0.0,
            coupon_paid: 0.0,
        }
    }

    #[test]
    fn notional_is_signed() {
        let mut trade = sample_trade();
        assert_eq!(trade.notional(), 600.0);
        trade.quantity_delta = -60.0;
        trade.side = TradeSide::Sell;
        assert_eq!(trade.notional(), -600.0);
    }

    #[test]
    fn close_flag() {
        let mut trade = sample_trade();
        assert!(!trade.is_close());
        trade.kind = TradeKind::Close;
        assert!(trade.is_close());
    }
}
