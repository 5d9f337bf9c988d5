//! Directors: scheduling policies that drive node triggering

mod data_driven;
mod demand_driven;
mod mt_data_driven;
mod publish_subscribe;

pub use data_driven::{BufferPlacement, DataDrivenDirector};
pub use demand_driven::DemandDrivenDirector;
pub use mt_data_driven::MtDataDrivenDirector;
pub use publish_subscribe::PublishSubscribeDirector;

use crate::graph::WorkflowGraph;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use wfcore::{Packet, Result, UnusedDataKind, UnusedDataRecord, WorkflowError, WrapupResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectorKind {
    #[default]
    PublishSubscribe,
    DataDriven,
    MtDataDriven,
    DemandDriven,
}

impl DirectorKind {
    pub fn create(self) -> Box<dyn Director> {
        match self {
            DirectorKind::PublishSubscribe => Box::new(PublishSubscribeDirector::new()),
            DirectorKind::DataDriven => Box::new(DataDrivenDirector::new()),
            DirectorKind::MtDataDriven => Box::new(MtDataDrivenDirector::new()),
            DirectorKind::DemandDriven => Box::new(DemandDrivenDirector::new()),
        }
    }

    pub fn all() -> [DirectorKind; 4] {
        [
            DirectorKind::PublishSubscribe,
            DirectorKind::DataDriven,
            DirectorKind::MtDataDriven,
            DirectorKind::DemandDriven,
        ]
    }
}

impl fmt::Display for DirectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DirectorKind::PublishSubscribe => "publish-subscribe",
            DirectorKind::DataDriven => "data-driven",
            DirectorKind::MtDataDriven => "mt-data-driven",
            DirectorKind::DemandDriven => "demand-driven",
        };
        f.write_str(name)
    }
}

impl FromStr for DirectorKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        DirectorKind::all()
            .into_iter()
            .find(|kind| kind.to_string() == s)
            .ok_or_else(|| WorkflowError::Configuration(format!("Unknown director kind: {}", s)))
    }
}

/// A scheduling policy over a workflow graph.
///
/// The workflow calls `elaborate` repeatedly (re-analyzing the graph in
/// between) until it reports no change, then `configure` and
/// `initialize` once, and `run` once per workflow run.
#[async_trait]
pub trait Director: Send + Sync {
    fn kind(&self) -> DirectorKind;

    /// Whether every node should fire at most once per run
    fn nodes_step_once(&self) -> bool {
        false
    }

    /// Adjust the graph; returns true when nodes or bindings changed
    fn elaborate(&mut self, _graph: &mut WorkflowGraph) -> Result<bool> {
        Ok(false)
    }

    fn configure(&mut self, _graph: &WorkflowGraph) -> Result<()> {
        Ok(())
    }

    async fn initialize(&mut self, _graph: &mut WorkflowGraph) -> Result<()> {
        Ok(())
    }

    /// Trigger nodes until the graph is quiescent
    async fn run(&mut self, graph: &mut WorkflowGraph) -> Result<()>;

    /// Packets the director itself still holds
    async fn wrapup(&mut self, _graph: &WorkflowGraph) -> Result<WrapupResult> {
        Ok(WrapupResult::new())
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {}
}

impl fmt::Debug for dyn Director {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director").field("kind", &self.kind()).finish()
    }
}

/// FIFO queues of packets awaiting delivery, keyed by node and inflow
pub(crate) type InflowQueues = BTreeMap<(usize, String), VecDeque<Packet>>;

pub(crate) fn queue_records(graph: &WorkflowGraph, queues: &mut InflowQueues) -> WrapupResult {
    let mut result = WrapupResult::new();
    for ((node, label), queue) in std::mem::take(queues) {
        result.add(UnusedDataRecord::new(
            graph.node(node).name(),
            label,
            UnusedDataKind::Queue,
            queue,
        ));
    }
    result
}
