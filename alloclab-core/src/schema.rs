//! Declarative tree manifests — the serialized form of a backtest setup.
//!
//! A `TreeSpec` describes the strategy tree (names, nesting, instrument
//! specs) and each strategy's decision chain as data, parseable from TOML or
//! JSON, and buildable into a live `Tree` + `ChainSet`. The spec is also the
//! canonical input to tree fingerprinting: `BTreeMap` everywhere, so its
//! serialization is deterministic.

use crate::algos::{
    Algo, AlgoStack, Annotate, Or, Rebalance, RunAfterDate, RunDaily, RunMonthly, RunOnce,
    RunWeekly, SetTargetValues, SetWeights,
};
use crate::data::DataFeed;
use crate::domain::ids::{hash_canonical, TreeHash};
use crate::domain::instrument::InstrumentSpec;
use crate::domain::tree::{Tree, TreeError};
use crate::engine::{Backtest, ChainSet, EngineError, RunConfig};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("manifest is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// One decision unit (or nested combinator) in declarative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlgoSpec {
    RunDaily,
    RunOnce,
    RunWeekly {
        #[serde(default = "default_true")]
        run_on_first_date: bool,
    },
    RunMonthly {
        #[serde(default = "default_true")]
        run_on_first_date: bool,
    },
    RunAfterDate {
        date: NaiveDate,
    },
    SetWeights {
        weights: BTreeMap<String, f64>,
    },
    SetTargetValues {
        targets: BTreeMap<String, f64>,
    },
    Annotate {
        message: String,
    },
    Rebalance,
    /// AND-composed nested stack.
    Stack {
        units: Vec<AlgoSpec>,
    },
    /// OR-composed alternatives.
    Any {
        units: Vec<AlgoSpec>,
    },
}

fn default_true() -> bool {
    true
}

impl AlgoSpec {
    /// Instantiate the runtime unit this spec describes.
    pub fn build(&self) -> Box<dyn Algo> {
        match self {
            AlgoSpec::RunDaily => Box::new(RunDaily),
            AlgoSpec::RunOnce => Box::new(RunOnce::new()),
            AlgoSpec::RunWeekly { run_on_first_date } => Box::new(RunWeekly {
                run_on_first_date: *run_on_first_date,
            }),
            AlgoSpec::RunMonthly { run_on_first_date } => Box::new(RunMonthly {
                run_on_first_date: *run_on_first_date,
            }),
            AlgoSpec::RunAfterDate { date } => Box::new(RunAfterDate::new(*date)),
            AlgoSpec::SetWeights { weights } => Box::new(SetWeights::new(weights.clone())),
            AlgoSpec::SetTargetValues { targets } => {
                Box::new(SetTargetValues::new(targets.clone()))
            }
            AlgoSpec::Annotate { message } => Box::new(Annotate::new(message.clone())),
            AlgoSpec::Rebalance => Box::new(Rebalance),
            AlgoSpec::Stack { units } => {
                Box::new(AlgoStack::new(units.iter().map(AlgoSpec::build).collect()))
            }
            AlgoSpec::Any { units } => {
                Box::new(Or::new(units.iter().map(AlgoSpec::build).collect()))
            }
        }
    }
}

/// An instrument leaf in declarative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentDef {
    pub name: String,
    #[serde(default)]
    pub spec: InstrumentSpec,
}

/// A strategy node in declarative form: named children plus a decision chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDef {
    pub name: String,
    #[serde(default)]
    pub children: Vec<NodeDef>,
    #[serde(default)]
    pub chain: Vec<AlgoSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum NodeDef {
    Strategy(StrategyDef),
    Instrument(InstrumentDef),
}

/// A whole backtest tree in declarative form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    pub root: StrategyDef,
    /// Instrument metadata for positions the rebalancer may open beyond the
    /// declared leaves.
    #[serde(default)]
    pub catalog: BTreeMap<String, InstrumentSpec>,
}

impl TreeSpec {
    pub fn from_toml_str(text: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Deterministic hash of the whole spec.
    pub fn tree_hash(&self) -> TreeHash {
        TreeHash(hash_canonical(self))
    }

    /// Build the live tree and its decision chains.
    pub fn build(&self) -> Result<(Tree, ChainSet), SchemaError> {
        let mut tree = Tree::new(self.root.name.clone());
        let mut chains = ChainSet::new();
        let root = tree.root();
        build_strategy(&mut tree, &mut chains, root, &self.root)?;
        Ok((tree, chains))
    }

    /// Build straight into a runnable `Backtest`. The spec's catalog merges
    /// over the config's (spec entries win).
    pub fn to_backtest(
        &self,
        feed: Box<dyn DataFeed>,
        dates: Vec<NaiveDate>,
        mut config: RunConfig,
    ) -> Result<Backtest, SchemaError> {
        let (tree, chains) = self.build()?;
        config
            .catalog
            .extend(self.catalog.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Backtest::new(tree, chains, feed, dates, config)?)
    }
}

fn build_strategy(
    tree: &mut Tree,
    chains: &mut ChainSet,
    id: crate::domain::tree::NodeId,
    def: &StrategyDef,
) -> Result<(), SchemaError> {
    if !def.chain.is_empty() {
        chains.insert(
            id,
            AlgoStack::named(
                format!("{}.chain", def.name),
                def.chain.iter().map(AlgoSpec::build).collect(),
            ),
        );
    }
    for child in &def.children {
        match child {
            NodeDef::Instrument(inst) => {
                tree.add_instrument(id, &inst.name, inst.spec.clone())?;
            }
            NodeDef::Strategy(sub) => {
                let child_id = tree.add_strategy(id, &sub.name)?;
                build_strategy(tree, chains, child_id, sub)?;
            }
        }
    }
    Ok(())
}
