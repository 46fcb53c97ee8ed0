//! Arena-backed strategy tree.
//!
//! Nodes live in a flat `Vec` addressed by `NodeId` indices; parent links are
//! plain ids, so the tree is acyclic and single-parent by construction and the
//! borrow checker never has to reason about shared ownership. Replacing a
//! child re-uses its slot in the parent's ordered child list; the replaced
//! subtree is simply orphaned in the arena (traversal always starts at the
//! root, so orphans are invisible).

use super::instrument::InstrumentSpec;
use super::node::{InstrumentState, Node, NodeKind, StrategyState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Arena index of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TreeError {
    #[error("node '{parent}' is an instrument leaf and cannot hold children")]
    InstrumentParent { parent: String },
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Create a tree with a single root strategy node.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Node::new(root_name, None, NodeKind::Strategy(StrategyState::new()));
        Self {
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Look up a direct child by name.
    pub fn child_named(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.nodes[parent.index()]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c.index()].name == name)
    }

    /// Attach a nested strategy node under `parent`.
    pub fn add_strategy(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.attach(parent, name, NodeKind::Strategy(StrategyState::new()))
    }

    /// Attach an instrument leaf under `parent`.
    pub fn add_instrument(
        &mut self,
        parent: NodeId,
        name: &str,
        spec: InstrumentSpec,
    ) -> Result<NodeId, TreeError> {
        self.attach(parent, name, NodeKind::Instrument(InstrumentState::new(spec)))
    }

    /// Re-adding an existing name replaces the child in place (same position
    /// in the ordered child list), never duplicates.
    fn attach(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId, TreeError> {
        if !self.nodes[parent.index()].kind.is_strategy() {
            return Err(TreeError::InstrumentParent {
                parent: self.nodes[parent.index()].name.clone(),
            });
        }

        let existing = self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| self.nodes[c.index()].name == name);

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(name, Some(parent), kind));

        match existing {
            Some(pos) => self.nodes[parent.index()].children[pos] = id,
            None => self.nodes[parent.index()].children.push(id),
        }
        Ok(id)
    }

    /// Slash-joined path from the root, e.g. `root/equities/AAPL`.
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let node = &self.nodes[c.index()];
            parts.push(node.name.as_str());
            cursor = node.parent;
        }
        parts.reverse();
        parts.join("/")
    }

    /// Parent-before-children order, children in insertion order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_pre(self.root, &mut out);
        out
    }

    fn collect_pre(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in &self.nodes[id.index()].children {
            self.collect_pre(child, out);
        }
    }

    /// Children-before-parent order.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.collect_post(self.root, &mut out);
        out
    }

    fn collect_post(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.nodes[id.index()].children {
            self.collect_post(child, out);
        }
        out.push(id);
    }

    /// Strategy nodes only, pre-order. The clock invokes decision chains in
    /// this order, so a parent's allocation lands before its children invest.
    pub fn strategies_pre_order(&self) -> Vec<NodeId> {
        self.pre_order()
            .into_iter()
            .filter(|&id| self.nodes[id.index()].kind.is_strategy())
            .collect()
    }

    /// Recompute every node's value bottom-up and every weight top-down.
    ///
    /// Leaf value is `price * quantity + accrued coupon`; strategy value is
    /// `cash + sum of child values`. A child's weight is its share of the
    /// parent's value (zero if the parent's value is zero); the root's weight
    /// is always 1.0.
    pub fn aggregate_values(&mut self) {
        for id in self.post_order() {
            let idx = id.index();
            let value = match &self.nodes[idx].kind {
                NodeKind::Instrument(inst) => inst.market_value(),
                NodeKind::Strategy(s) => {
                    let child_sum: f64 = self.nodes[idx]
                        .children
                        .iter()
                        .map(|c| self.nodes[c.index()].value)
                        .sum();
                    s.cash + child_sum
                }
            };
            self.nodes[idx].value = value;
        }

        self.nodes[self.root.index()].weight = 1.0;
        for id in self.pre_order() {
            let parent_value = self.nodes[id.index()].value;
            let children = self.nodes[id.index()].children.clone();
            for child in children {
                let weight = if parent_value != 0.0 {
                    self.nodes[child.index()].value / parent_value
                } else {
                    0.0
                };
                self.nodes[child.index()].weight = weight;
            }
        }
    }

    /// Wipe every node's temp scope. Invoked by the clock once per date.
    pub fn clear_temp_all(&mut self) {
        for id in self.pre_order() {
            self.nodes[id.index()].state.clear_temp();
        }
    }
}
