use super::{Director, DirectorKind};
use crate::graph::WorkflowGraph;
use crate::nodes::{BufferNode, NodeKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use wfcore::Result;

/// Which inflows get a buffer in front of them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferPlacement {
    #[default]
    EveryInflow,
    /// Only inflows bound to more than one outflow
    MultiplyFed,
}

/// Single-threaded scheduler that decouples producers from consumers with
/// buffer nodes and moves a packet along an edge only when every receiver
/// can accept it
#[derive(Debug, Default)]
pub struct DataDrivenDirector {
    nodes_step_once: bool,
    placement: BufferPlacement,
    buffers_inserted: bool,
}

impl DataDrivenDirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes_step_once(mut self, nodes_step_once: bool) -> Self {
        self.nodes_step_once = nodes_step_once;
        self
    }

    pub fn with_buffer_placement(mut self, placement: BufferPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Publish each ready outflow of `index` whose subscribers are all ready
    async fn publish_ready_outputs(&self, graph: &mut WorkflowGraph, index: usize) -> Result<bool> {
        let mut published = false;
        for label in graph.node(index).core().outflow_labels() {
            if !graph.node(index).output_packet_ready(&label) {
                continue;
            }
            let subscribers = graph.subscribers(index, &label);
            let all_ready = subscribers
                .iter()
                .all(|(to, inflow)| graph.node(*to).ready_for_input_packet(inflow));
            if !all_ready {
                continue;
            }
            let packet = graph.node_mut(index).get_output_packet(&label)?;
            for (to, inflow) in subscribers {
                graph.node_mut(to).set_input_packet(&inflow, packet.clone()).await?;
            }
            published = true;
        }
        Ok(published)
    }
}

#[async_trait]
impl Director for DataDrivenDirector {
    fn kind(&self) -> DirectorKind {
        DirectorKind::DataDriven
    }

    fn nodes_step_once(&self) -> bool {
        self.nodes_step_once
    }

    fn elaborate(&mut self, graph: &mut WorkflowGraph) -> Result<bool> {
        if self.buffers_inserted {
            return Ok(false);
        }
        self.buffers_inserted = true;

        let mut targets: Vec<(String, String, usize)> = Vec::new();
        for (index, node) in graph.nodes().iter().enumerate() {
            if node.kind() == NodeKind::Buffer {
                continue;
            }
            for inflow in node.core().inflows() {
                let buffered = match self.placement {
                    BufferPlacement::EveryInflow => true,
                    BufferPlacement::MultiplyFed => graph.sources(index, inflow.label()).len() > 1,
                };
                if buffered {
                    targets.push((inflow.label().to_string(), node.name().to_string(), index));
                }
            }
        }
        targets.sort();

        for (label, name, index) in &targets {
            let expression = match graph.node(*index).core().inflow(label) {
                Some(inflow) => inflow.template().expression().to_string(),
                None => continue,
            };
            let buffer = BufferNode::for_inflow(name, label, &expression)?;
            if let Some(binding) = buffer.output_binding() {
                graph.node_mut(*index).core_mut().rebind_inflow(label, binding)?;
            }
            tracing::debug!(node = %name, inflow = %label, "inserted buffer");
            graph.add_node(Box::new(buffer));
        }
        Ok(!targets.is_empty())
    }

    async fn run(&mut self, graph: &mut WorkflowGraph) -> Result<()> {
        loop {
            let mut progress = false;
            for index in 0..graph.len() {
                if graph.node_mut(index).trigger().await? {
                    progress = true;
                }
                if self.publish_ready_outputs(graph, index).await? {
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
        tracing::debug!("data-driven run quiescent");
        Ok(())
    }
}
