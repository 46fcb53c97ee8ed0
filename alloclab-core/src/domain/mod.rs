//! Domain types: the strategy tree, scoped state, instruments, trades,
//! snapshots, and deterministic hashes.

pub mod ids;
pub mod instrument;
pub mod node;
pub mod snapshot;
pub mod state;
pub mod trade;
pub mod tree;

pub use ids::{DatasetHash, ReportDigest, TreeHash};
pub use instrument::{InstrumentSpec, ShortPolicy};
pub use node::{InstrumentState, Node, NodeKind, StrategyState};
pub use snapshot::{DateSnapshot, NodeSnapshot};
pub use state::{Scope, ScopedState, StateError, StateValue};
pub use trade::{TradeKind, TradeRecord, TradeSide};
pub use tree::{NodeId, Tree, TreeError};
