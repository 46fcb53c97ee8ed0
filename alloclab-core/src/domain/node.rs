//! Node kinds stored in the tree arena.

use super::instrument::InstrumentSpec;
use super::state::ScopedState;
use super::tree::NodeId;

/// Live state of an instrument leaf: current price, held quantity (signed;
/// negative = short), and coupon accrued since the position last closed.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub spec: InstrumentSpec,
    pub price: f64,
    pub quantity: f64,
    pub accrued_coupon: f64,
}

impl InstrumentState {
    pub fn new(spec: InstrumentSpec) -> Self {
        Self {
            spec,
            price: 0.0,
            quantity: 0.0,
            accrued_coupon: 0.0,
        }
    }

    /// `price * quantity + accrued coupon`.
    pub fn market_value(&self) -> f64 {
        self.price * self.quantity + self.accrued_coupon
    }

    pub fn is_flat(&self) -> bool {
        self.quantity == 0.0
    }
}

/// Live state of a strategy node: uninvested capital.
#[derive(Debug, Clone)]
pub struct StrategyState {
    pub cash: f64,
}

impl StrategyState {
    pub fn new() -> Self {
        Self { cash: 0.0 }
    }
}

impl Default for StrategyState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Strategy(StrategyState),
    Instrument(InstrumentState),
}

impl NodeKind {
    pub fn is_strategy(&self) -> bool {
        matches!(self, NodeKind::Strategy(_))
    }

    pub fn is_instrument(&self) -> bool {
        matches!(self, NodeKind::Instrument(_))
    }

    pub fn as_strategy(&self) -> Option<&StrategyState> {
        match self {
            NodeKind::Strategy(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_strategy_mut(&mut self) -> Option<&mut StrategyState> {
        match self {
            NodeKind::Strategy(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_instrument(&self) -> Option<&InstrumentState> {
        match self {
            NodeKind::Instrument(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_instrument_mut(&mut self) -> Option<&mut InstrumentState> {
        match self {
            NodeKind::Instrument(i) => Some(i),
            _ => None,
        }
    }
}

/// One arena entry. The parent link is a bare `NodeId` — used only for value
/// aggregation and path reporting, never for ownership.
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub kind: NodeKind,
    /// Ordered children (insertion order significant). Always empty for
    /// instrument leaves.
    pub children: Vec<NodeId>,
    /// Aggregated value at the last update.
    pub value: f64,
    /// Fraction of the parent's value this node represents. Root is 1.0.
    pub weight: f64,
    pub state: ScopedState,
}

impl Node {
    pub fn new(name: impl Into<String>, parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            parent,
            kind,
            children: Vec::new(),
            value: 0.0,
            weight: 0.0,
            state: ScopedState::new(),
        }
    }
}
