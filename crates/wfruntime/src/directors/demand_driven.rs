use super::{Director, DirectorKind};
use crate::graph::WorkflowGraph;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use wfcore::Result;

/// Pull-based scheduler: each round, every sink asks its upstream nodes to
/// fire first, then consumes what they produced
#[derive(Debug)]
pub struct DemandDrivenDirector {
    nodes_step_once: bool,
    firing_count: usize,
}

impl DemandDrivenDirector {
    pub fn new() -> Self {
        Self {
            nodes_step_once: false,
            firing_count: 1,
        }
    }

    pub fn with_nodes_step_once(mut self, nodes_step_once: bool) -> Self {
        self.nodes_step_once = nodes_step_once;
        self
    }

    /// Number of demand rounds per run
    pub fn with_firing_count(mut self, firing_count: usize) -> Self {
        self.firing_count = firing_count;
        self
    }

    pub fn firing_count(&self) -> usize {
        self.firing_count
    }

    fn activate<'a>(
        graph: &'a mut WorkflowGraph,
        index: usize,
        stepped: &'a mut Vec<bool>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            stepped[index] = true;
            for upstream in graph.upstream(index) {
                if !stepped[upstream] {
                    Self::activate(graph, upstream, stepped).await?;
                }
            }

            for label in graph.node(index).core().inflow_labels() {
                let sources: Vec<(usize, String)> = graph
                    .sources(index, &label)
                    .into_iter()
                    .map(|edge| (edge.from, edge.outflow.clone()))
                    .collect();
                for (from, outflow) in sources {
                    if !graph.node(index).ready_for_input_packet(&label) {
                        break;
                    }
                    let packet = graph
                        .node(from)
                        .core()
                        .outflow(&outflow)
                        .and_then(|o| o.peek().cloned());
                    if let Some(packet) = packet {
                        graph.node_mut(index).set_input_packet(&label, packet).await?;
                    }
                }
            }

            graph.node_mut(index).trigger().await?;
            Ok(())
        }
        .boxed()
    }

    fn clear_outflows(graph: &mut WorkflowGraph) {
        for node in graph.nodes_mut() {
            node.core_mut().clear_outflows();
        }
    }
}

impl Default for DemandDrivenDirector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Director for DemandDrivenDirector {
    fn kind(&self) -> DirectorKind {
        DirectorKind::DemandDriven
    }

    fn nodes_step_once(&self) -> bool {
        self.nodes_step_once
    }

    async fn run(&mut self, graph: &mut WorkflowGraph) -> Result<()> {
        let sinks = graph.sinks();
        for round in 0..self.firing_count {
            Self::clear_outflows(graph);
            let mut stepped = vec![false; graph.len()];
            for &sink in &sinks {
                if !stepped[sink] {
                    Self::activate(graph, sink, &mut stepped).await?;
                }
            }
            tracing::debug!(round = round + 1, "demand round complete");
        }
        Self::clear_outflows(graph);
        Ok(())
    }
}
