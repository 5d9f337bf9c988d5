use super::{queue_records, Director, DirectorKind, InflowQueues};
use crate::graph::WorkflowGraph;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use wfcore::{Result, WrapupResult};

/// Single-threaded reference scheduler.
///
/// Nodes are triggered in graph order. Every packet a node publishes is
/// queued for each subscriber, and subscribers (in name order) are fed
/// and fired immediately, so data cascades depth-first through the graph.
#[derive(Debug, Default)]
pub struct PublishSubscribeDirector {
    nodes_step_once: bool,
    queues: InflowQueues,
}

impl PublishSubscribeDirector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes_step_once(mut self, nodes_step_once: bool) -> Self {
        self.nodes_step_once = nodes_step_once;
        self
    }

    /// Move every ready outflow packet of `index` into subscriber queues,
    /// then feed and fire the subscribers
    fn publish_outputs<'a>(
        &'a mut self,
        graph: &'a mut WorkflowGraph,
        index: usize,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let mut fed: Vec<usize> = Vec::new();
            for label in graph.node(index).core().outflow_labels() {
                if !graph.node(index).output_packet_ready(&label) {
                    continue;
                }
                let packet = graph.node_mut(index).get_output_packet(&label)?;
                for (to, inflow) in graph.subscribers(index, &label) {
                    self.queues
                        .entry((to, inflow))
                        .or_default()
                        .push_back(packet.clone());
                    fed.push(to);
                }
            }
            fed.sort_by(|a, b| graph.node(*a).name().cmp(graph.node(*b).name()));
            fed.dedup();
            for to in fed {
                self.feed_and_fire(graph, to).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Deliver queued packets to `index` and fire it until it stops
    async fn feed_and_fire(&mut self, graph: &mut WorkflowGraph, index: usize) -> Result<bool> {
        let mut fired = false;
        loop {
            self.deliver(graph, index).await?;
            if !graph.node_mut(index).trigger().await? {
                return Ok(fired);
            }
            fired = true;
            self.publish_outputs(graph, index).await?;
        }
    }

    /// Hand one queued packet to each ready inflow of `index`
    async fn deliver(&mut self, graph: &mut WorkflowGraph, index: usize) -> Result<bool> {
        let mut delivered = false;
        for label in graph.node(index).core().inflow_labels() {
            if !graph.node(index).ready_for_input_packet(&label) {
                continue;
            }
            let packet = self
                .queues
                .get_mut(&(index, label.clone()))
                .and_then(|queue| queue.pop_front());
            if let Some(packet) = packet {
                graph.node_mut(index).set_input_packet(&label, packet).await?;
                delivered = true;
            }
        }
        Ok(delivered)
    }
}

#[async_trait]
impl Director for PublishSubscribeDirector {
    fn kind(&self) -> DirectorKind {
        DirectorKind::PublishSubscribe
    }

    fn nodes_step_once(&self) -> bool {
        self.nodes_step_once
    }

    async fn run(&mut self, graph: &mut WorkflowGraph) -> Result<()> {
        self.queues.clear();
        loop {
            let mut progress = false;
            for index in 0..graph.len() {
                if graph.node_mut(index).trigger().await? {
                    progress = true;
                    self.publish_outputs(graph, index).await?;
                }
            }
            if progress {
                continue;
            }
            for index in 0..graph.len() {
                if self.deliver(graph, index).await? {
                    progress = true;
                    self.feed_and_fire(graph, index).await?;
                }
            }
            if !progress {
                break;
            }
        }
        tracing::debug!("publish-subscribe run quiescent");
        Ok(())
    }

    async fn wrapup(&mut self, graph: &WorkflowGraph) -> Result<WrapupResult> {
        Ok(queue_records(graph, &mut self.queues))
    }

    fn reset(&mut self) {
        self.queues.clear();
    }
}
