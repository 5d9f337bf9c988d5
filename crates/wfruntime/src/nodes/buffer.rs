use super::flow::{Inflow, Outflow};
use super::{NodeCore, NodeKind, Received, WorkflowNode};
use async_trait::async_trait;
use std::any::Any;
use std::collections::VecDeque;
use wfcore::{Packet, Result, UnusedDataKind, UnusedDataRecord, WrapupResult};

/// Hidden FIFO relay inserted in front of a node's inflow so the node can
/// consume at its own pace
pub struct BufferNode {
    core: NodeCore,
    queue: VecDeque<Packet>,
}

pub(crate) const BUFFER_INPUT: &str = "input";
pub(crate) const BUFFER_OUTPUT: &str = "output";

impl BufferNode {
    /// Buffer for inflow `label` of `node`, reading `expression` and
    /// republishing under a path unique to the buffer
    pub fn for_inflow(node: &str, label: &str, expression: &str) -> Result<Self> {
        let name = format!("BufferNode-for-{}-{}", node, label);
        let inflow = Inflow::new(BUFFER_INPUT, expression)?;
        let outflow_expression = format!("/{}{}", name, inflow.template().path());
        let outflow = Outflow::new(BUFFER_OUTPUT, &outflow_expression)?;
        let mut core = NodeCore::new(Some(name));
        core.set_hidden(true);
        core.add_inflow(inflow)?;
        core.add_outflow(outflow)?;
        Ok(Self {
            core,
            queue: VecDeque::new(),
        })
    }

    /// Binding of the buffer's outflow, for rewiring the buffered inflow
    pub fn output_binding(&self) -> Option<String> {
        self.core.outflows().first().map(Outflow::binding)
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl WorkflowNode for BufferNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Buffer
    }

    async fn initialize(&mut self) -> Result<()> {
        self.core.initialize();
        self.queue.clear();
        Ok(())
    }

    fn ready_for_input_packet(&self, label: &str) -> bool {
        self.core
            .inflow(label)
            .map(|inflow| !inflow.eos_received())
            .unwrap_or(false)
    }

    async fn set_input_packet(&mut self, label: &str, packet: Packet) -> Result<()> {
        self.queue.push_back(packet.clone());
        if let Received::EndOfStream { .. } = self.core.receive_packet(label, packet, false)? {
            return Ok(());
        }
        self.core.clear_inflows(true);
        Ok(())
    }

    async fn trigger(&mut self) -> Result<bool> {
        if self.core.is_finished()? {
            return Ok(false);
        }
        if self.output_packet_ready(BUFFER_OUTPUT) {
            return Ok(false);
        }
        let Some(packet) = self.queue.pop_front() else {
            return Ok(false);
        };
        if packet.is_end_of_stream() {
            self.core.send_eos()?;
            self.core.flag_finished();
        } else {
            self.core.send_packet(BUFFER_OUTPUT, packet)?;
        }
        Ok(true)
    }

    async fn wrapup(&mut self) -> Result<WrapupResult> {
        let mut result = self.core.unused_data();
        result.add(UnusedDataRecord::new(
            self.core.name(),
            BUFFER_INPUT,
            UnusedDataKind::Queue,
            self.queue.drain(..),
        ));
        self.core.finish_wrapup();
        Ok(result)
    }

    fn reset(&mut self) {
        self.core.reset();
        self.queue.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
