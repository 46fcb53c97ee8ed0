//! AllocLab Core — composable capital-allocation backtesting engine.
//!
//! This crate contains the whole simulation core:
//! - Domain types (arena strategy tree, scoped temp/perm state, instruments,
//!   trades, snapshots)
//! - The `Algo` decision-unit contract and its two combinators
//!   (`AlgoStack` = AND short-circuit, `Or` = OR short-circuit)
//! - The rebalancer: target weights/values → minimal trade set, with
//!   bid/offer spread and coupon handling
//! - The simulation clock: date-stepping state machine with bottom-up value
//!   aggregation, temp clearing, pre-order chain invocation, and per-date
//!   snapshots
//! - Declarative tree manifests (TOML/JSON) and deterministic run
//!   fingerprints

pub mod algos;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod schema;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: engine types are Send (+ Sync where shared), so
    /// independent backtests can fan out across rayon workers without a
    /// retrofit. If any type regresses, the build breaks here.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Tree>();
        require_sync::<domain::Tree>();
        require_send::<domain::ScopedState>();
        require_sync::<domain::ScopedState>();
        require_send::<domain::InstrumentSpec>();
        require_sync::<domain::InstrumentSpec>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<domain::DateSnapshot>();
        require_sync::<domain::DateSnapshot>();

        // Decision units are trait objects shared across a run
        require_send::<Box<dyn algos::Algo>>();
        require_sync::<Box<dyn algos::Algo>>();
        require_send::<algos::AlgoStack>();
        require_sync::<algos::AlgoStack>();

        // Engine types
        require_send::<engine::Backtest>();
        require_send::<engine::RunReport>();
        require_sync::<engine::RunReport>();
        require_send::<engine::EngineError>();
        require_sync::<engine::EngineError>();

        // Data types
        require_send::<data::InMemoryFeed>();
        require_sync::<data::InMemoryFeed>();

        // Declarative specs
        require_send::<schema::TreeSpec>();
        require_sync::<schema::TreeSpec>();
        require_send::<fingerprint::RunFingerprint>();
        require_sync::<fingerprint::RunFingerprint>();
    }
}
