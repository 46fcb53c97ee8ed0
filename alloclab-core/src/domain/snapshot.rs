//! Per-date tree snapshots recorded into the run history.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// State of a single node at the end of a date's pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Slash-joined path from the root, e.g. `root/equities/AAPL`.
    pub path: String,
    pub value: f64,
    /// Fraction of the parent's value. Root is 1.0.
    pub weight: f64,
    /// Held quantity — instrument leaves only.
    pub quantity: Option<f64>,
    /// Uninvested capital — strategy nodes only.
    pub cash: Option<f64>,
}

/// Full-tree snapshot for one date, nodes in pre-order (root first).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateSnapshot {
    pub date: NaiveDate,
    /// Boolean returned by the root node's decision chain this date.
    pub root_decision: bool,
    pub nodes: Vec<NodeSnapshot>,
}

impl DateSnapshot {
    /// Look up a node by its full path.
    pub fn node(&self, path: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.path == path)
    }

    /// The root node's value (first pre-order entry).
    pub fn root_value(&self) -> f64 {
        self.nodes.first().map(|n| n.value).unwrap_or(0.0)
    }
}
