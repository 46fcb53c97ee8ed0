//! Data feed trait and the in-memory implementation.
//!
//! The feed is the engine's only data boundary: per-instrument daily prices
//! plus named auxiliary series decision units may request by key. Missing
//! prices are errors, never forward-filled — a backtest that silently carries
//! a stale price forward is lying about liquidity.

use crate::domain::ids::{hash_canonical, DatasetHash};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("unknown instrument '{name}'")]
    UnknownInstrument { name: String },

    #[error("no price for '{name}' on {date}")]
    MissingPrice { name: String, date: NaiveDate },
}

/// Read-only price and auxiliary-data source for one run.
pub trait DataFeed: Send + Sync {
    /// Whether this feed carries a price series for `name` at all.
    fn has_instrument(&self, name: &str) -> bool;

    /// Price of `name` on exactly `date`.
    fn price_at(&self, name: &str, date: NaiveDate) -> Result<f64, FeedError>;

    /// Named side-channel series registered at run setup, keyed by date.
    fn auxiliary(&self, key: &str) -> Option<&BTreeMap<NaiveDate, f64>>;
}

/// The shipped feed: everything held in memory, `BTreeMap` throughout so
/// iteration order (and therefore the content hash) is deterministic.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InMemoryFeed {
    prices: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
    auxiliary: BTreeMap<String, BTreeMap<NaiveDate, f64>>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: add a full price series for one instrument.
    pub fn with_series(
        mut self,
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Self {
        self.insert_series(name, points);
        self
    }

    pub fn insert_series(
        &mut self,
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) {
        self.prices
            .entry(name.into())
            .or_default()
            .extend(points);
    }

    pub fn insert_price(&mut self, name: impl Into<String>, date: NaiveDate, price: f64) {
        self.prices.entry(name.into()).or_default().insert(date, price);
    }

    pub fn register_auxiliary(
        &mut self,
        key: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) {
        self.auxiliary
            .entry(key.into())
            .or_default()
            .extend(points);
    }

    /// BLAKE3 content hash over all series, for run fingerprinting.
    pub fn content_hash(&self) -> DatasetHash {
        DatasetHash(hash_canonical(self))
    }
}

impl DataFeed for InMemoryFeed {
    fn has_instrument(&self, name: &str) -> bool {
        self.prices.contains_key(name)
    }

    fn price_at(&self, name: &str, date: NaiveDate) -> Result<f64, FeedError> {
        let series = self
            .prices
            .get(name)
            .ok_or_else(|| FeedError::UnknownInstrument {
                name: name.to_string(),
            })?;
        series
            .get(&date)
            .copied()
            .ok_or_else(|| FeedError::MissingPrice {
                name: name.to_string(),
                date,
            })
    }

    fn auxiliary(&self, key: &str) -> Option<&BTreeMap<NaiveDate, f64>> {
        self.auxiliary.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn price_lookup_and_errors() {
        let feed = InMemoryFeed::new().with_series("SPY", [(d(2024, 1, 2), 470.0)]);

        assert!(feed.has_instrument("SPY"));
        assert!(!feed.has_instrument("QQQ"));
        assert_eq!(feed.price_at("SPY", d(2024, 1, 2)).unwrap(), 470.0);

        assert_eq!(
            feed.price_at("QQQ", d(2024, 1, 2)).unwrap_err(),
            FeedError::UnknownInstrument { name: "QQQ".into() }
        );
        assert_eq!(
            feed.price_at("SPY", d(2024, 1, 3)).unwrap_err(),
            FeedError::MissingPrice {
                name: "SPY".into(),
                date: d(2024, 1, 3)
            }
        );
    }

    #[test]
    fn auxiliary_series_round_trip() {
        let mut feed = InMemoryFeed::new();
        feed.register_auxiliary("risk_free", [(d(2024, 1, 2), 0.0002)]);

        let series = feed.auxiliary("risk_free").unwrap();
        assert_eq!(series[&d(2024, 1, 2)], 0.0002);
        assert!(feed.auxiliary("inflation").is_none());
    }

    #[test]
    fn content_hash_tracks_content() {
        let feed_a = InMemoryFeed::new().with_series("SPY", [(d(2024, 1, 2), 470.0)]);
        let feed_b = InMemoryFeed::new().with_series("SPY", [(d(2024, 1, 2), 470.0)]);
        let feed_c = InMemoryFeed::new().with_series("SPY", [(d(2024, 1, 2), 471.0)]);

        assert_eq!(feed_a.content_hash(), feed_b.content_hash());
        assert_ne!(feed_a.content_hash(), feed_c.content_hash());
    }
}
