use super::trade::TradeSide;
use serde::{Deserialize, Serialize};

/// Whether an instrument may be held at a negative quantity.
///
/// This is a policy of the instrument, not the rebalancer: a negative target
/// against a `Disallowed` instrument fails the rebalance with `InvalidTarget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShortPolicy {
    #[default]
    Allowed,
    Disallowed,
}

/// Static instrument metadata, registered at backtest setup.
///
/// `lot_size` is the smallest tradeable quantity; `0.0` means continuous
/// (fractional quantities of any size). Quantity deltas are rounded toward
/// zero to a whole number of lots, so a rebalance never overshoots its target
/// or spends cash it does not hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSpec {
    #[serde(default)]
    pub lot_size: f64,
    #[serde(default)]
    pub shorting: ShortPolicy,
    /// Per-date coupon accrual per unit of quantity. `0.0` for non-fixed-income.
    #[serde(default)]
    pub coupon_rate: f64,
    /// Absolute bid/offer spread: buys execute at `price + spread/2`,
    /// sells at `price - spread/2`.
    #[serde(default)]
    pub bid_offer_spread: f64,
}

impl Default for InstrumentSpec {
    fn default() -> Self {
        Self {
            lot_size: 0.0,
            shorting: ShortPolicy::Allowed,
            coupon_rate: 0.0,
            bid_offer_spread: 0.0,
        }
    }
}

impl InstrumentSpec {
    /// Frictionless, continuously divisible instrument.
    pub fn continuous() -> Self {
        Self::default()
    }

    /// Whole-share equity.
    pub fn equity() -> Self {
        Self {
            lot_size: 1.0,
            ..Self::default()
        }
    }

    /// Coupon-paying instrument quoted with a bid/offer spread.
    pub fn bond(coupon_rate: f64, bid_offer_spread: f64) -> Self {
        Self {
            lot_size: 1.0,
            coupon_rate,
            bid_offer_spread,
            ..Self::default()
        }
    }

    pub fn half_spread(&self) -> f64 {
        self.bid_offer_spread / 2.0
    }

    /// Side-aware execution price: buys pay the offer, sells receive the bid.
    pub fn exec_price(&self, mid: f64, side: TradeSide) -> f64 {
        match side {
            TradeSide::Buy => mid + self.half_spread(),
            TradeSide::Sell => mid - self.half_spread(),
        }
    }

    /// Round a quantity delta toward zero to a whole number of lots.
    pub fn round_quantity(&self, qty: f64) -> f64 {
        if self.lot_size <= 0.0 {
            qty
        } else {
            (qty / self.lot_size).trunc() * self.lot_size
        }
    }
}
