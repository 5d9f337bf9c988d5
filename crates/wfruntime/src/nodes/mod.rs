//! Workflow nodes: the vertices of a workflow graph

mod actor_node;
mod buffer;
mod node_core;
mod flow;
mod merge;
mod portal;

pub use actor_node::{ActorNode, ActorNodeConfig};
pub use buffer::BufferNode;
pub use node_core::NodeCore;
pub(crate) use node_core::Received;
pub use flow::{Inflow, Outflow};
pub use merge::{MergeNode, MergePolicy};
pub use portal::{InPortal, OutPortal};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use wfcore::{ActorCompletionService, Completion, Packet, Result, Value, WorkflowContext, WrapupResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Actor,
    Buffer,
    Merge,
    InPortal,
    OutPortal,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Actor => "ActorNode",
            NodeKind::Buffer => "BufferNode",
            NodeKind::Merge => "MergeNode",
            NodeKind::InPortal => "InPortal",
            NodeKind::OutPortal => "OutPortal",
        };
        f.write_str(name)
    }
}

/// A vertex of the workflow graph.
///
/// Directors deliver packets with [`WorkflowNode::set_input_packet`],
/// fire the node with [`WorkflowNode::trigger`] and collect results from
/// its outflows with [`WorkflowNode::get_output_packet`]. Nodes that step
/// an actor concurrently split triggering into `start_trigger` and
/// `finish_trigger` around a completion service.
#[async_trait]
pub trait WorkflowNode: Send + Sync {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    fn kind(&self) -> NodeKind;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn elaborate(&mut self) -> Result<()> {
        Ok(())
    }

    fn configure(&mut self, context: &WorkflowContext) -> Result<()> {
        self.core_mut().configure(context)
    }

    async fn initialize(&mut self) -> Result<()> {
        self.core_mut().initialize();
        Ok(())
    }

    fn input_is_optional(&self, _label: &str) -> bool {
        false
    }

    /// Whether inflow `label` can accept another packet now
    fn ready_for_input_packet(&self, label: &str) -> bool;

    /// Deliver `packet` to inflow `label`
    async fn set_input_packet(&mut self, label: &str, packet: Packet) -> Result<()> {
        let optional = self.input_is_optional(label);
        match self.core_mut().receive_packet(label, packet, optional)? {
            Received::EndOfStream { close_input } => self.handle_end_of_stream(label, close_input),
            Received::Data {
                value,
                control,
                bindings,
            } => {
                for (name, bound) in bindings {
                    self.load_variable(&name, bound)?;
                }
                if control {
                    Ok(())
                } else {
                    self.load_input(label, value)
                }
            }
        }
    }

    /// Bind data received on inflow `label`
    fn load_input(&mut self, _label: &str, _value: Value) -> Result<()> {
        Ok(())
    }

    /// Bind a template variable recovered from a received packet
    fn load_variable(&mut self, _name: &str, _value: Value) -> Result<()> {
        Ok(())
    }

    fn handle_end_of_stream(&mut self, _label: &str, _close_input: bool) -> Result<()> {
        Ok(())
    }

    /// Attempt one firing; returns whether the node did anything
    async fn trigger(&mut self) -> Result<bool>;

    /// Begin a firing without waiting for its result
    async fn start_trigger(&mut self) -> Result<bool> {
        self.trigger().await
    }

    /// Complete a firing begun with `start_trigger`
    async fn finish_trigger(&mut self, _completion: Option<Completion>) -> Result<()> {
        Ok(())
    }

    /// Service stepping this node's actor, for nodes that have one
    fn completion_service(&self) -> Option<Arc<dyn ActorCompletionService>> {
        None
    }

    /// Firings that may be in flight at once
    fn max_concurrent_steps(&self) -> usize {
        1
    }

    /// True when every inflow holds a packet or will never get one
    fn all_inputs_staged(&self) -> bool {
        self.core()
            .inflows()
            .iter()
            .all(|inflow| inflow.packet().is_some() || !self.ready_for_input_packet(inflow.label()))
    }

    fn output_packet_ready(&self, label: &str) -> bool {
        self.core().outflow(label).map(|o| o.packet_ready()).unwrap_or(false)
    }

    /// Remove the pending packet from outflow `label`
    fn get_output_packet(&mut self, label: &str) -> Result<Packet> {
        self.core_mut().get_output_packet(label)
    }

    fn is_done_stepping(&self) -> Result<bool> {
        self.core().is_done_stepping()
    }

    fn is_finished(&self) -> Result<bool> {
        self.core().is_finished()
    }

    async fn wrapup(&mut self) -> Result<WrapupResult> {
        let result = self.core().unused_data();
        self.core_mut().finish_wrapup();
        Ok(result)
    }

    async fn dispose(&mut self) -> Result<()> {
        Ok(())
    }

    fn reset(&mut self) {
        self.core_mut().reset();
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn WorkflowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowNode")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}
