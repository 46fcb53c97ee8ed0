//! Run fingerprinting — deterministic identification of a backtest setup.
//!
//! - `TreeHash`: identity of the tree description (structure + chains).
//! - `DatasetHash`: content identity of the feed.
//! - `RunFingerprint`: the pair plus date range and capital — everything
//!   needed to recognize "the same run". Two runs with equal fingerprints
//!   must produce equal `ReportDigest`s.

use crate::data::InMemoryFeed;
use crate::domain::ids::{hash_canonical, DatasetHash, TreeHash};
use crate::engine::RunConfig;
use crate::schema::TreeSpec;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    pub tree_hash: TreeHash,
    /// Absent when the feed is a custom implementation without content hashing.
    pub dataset_hash: Option<DatasetHash>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub initial_capital: f64,
}

impl RunFingerprint {
    pub fn new(
        spec: &TreeSpec,
        feed: Option<&InMemoryFeed>,
        dates: &[NaiveDate],
        config: &RunConfig,
    ) -> Self {
        Self {
            tree_hash: spec.tree_hash(),
            dataset_hash: feed.map(InMemoryFeed::content_hash),
            start_date: dates.first().copied(),
            end_date: dates.last().copied(),
            initial_capital: config.initial_capital,
        }
    }

    /// Single stable hex id for the whole fingerprint.
    pub fn hash(&self) -> String {
        hash_canonical(self)
    }
}
