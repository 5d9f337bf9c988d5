use super::{NodeCore, NodeKind, WorkflowNode};
use super::flow::{Inflow, Outflow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use wfcore::{Packet, Result};

/// How a merge chooses among inflows holding packets at the same time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Accept one packet at a time, forwarding it before taking another
    #[default]
    ArrivalOrder,
    /// Hold one packet per inflow and forward them in inflow order
    RoundRobin,
}

/// Interleaves several input streams into one
pub struct MergeNode {
    core: NodeCore,
    policy: MergePolicy,
    next: usize,
}

impl MergeNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: NodeCore::new(Some(name.into())),
            policy: MergePolicy::default(),
            next: 0,
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_inflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_inflow(Inflow::new(label, expression)?)?;
        Ok(self)
    }

    pub fn with_outflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_outflow(Outflow::new(label, expression)?)?;
        Ok(self)
    }

    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    fn pending(&self) -> bool {
        self.core.inflows().iter().any(|i| i.packet().is_some())
    }

    /// Index of the inflow to forward from next
    fn next_ready(&self) -> Option<usize> {
        let inflows = self.core.inflows();
        let count = inflows.len();
        (0..count)
            .map(|offset| (self.next + offset) % count)
            .find(|&i| inflows[i].packet().is_some())
    }
}

#[async_trait]
impl WorkflowNode for MergeNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Merge
    }

    async fn initialize(&mut self) -> Result<()> {
        self.core.initialize();
        self.next = 0;
        Ok(())
    }

    fn input_is_optional(&self, _label: &str) -> bool {
        true
    }

    fn ready_for_input_packet(&self, label: &str) -> bool {
        let Some(inflow) = self.core.inflow(label) else {
            return false;
        };
        if inflow.eos_received() || inflow.packet().is_some() {
            return false;
        }
        match self.policy {
            MergePolicy::ArrivalOrder => !self.pending(),
            MergePolicy::RoundRobin => true,
        }
    }

    fn all_inputs_staged(&self) -> bool {
        self.pending()
    }

    async fn trigger(&mut self) -> Result<bool> {
        if self.core.is_finished()? {
            return Ok(false);
        }
        if self.core.outflows().iter().any(Outflow::packet_ready) {
            return Ok(false);
        }
        if self.core.is_done_stepping()? && !self.pending() {
            self.core.send_eos()?;
            self.core.flag_finished();
            return Ok(true);
        }
        let Some(index) = self.next_ready() else {
            return Ok(false);
        };
        let inflow = &self.core.inflows()[index];
        let label = inflow.label().to_string();
        let value = inflow.packet().map(Packet::data).unwrap_or_default();
        if self.policy == MergePolicy::RoundRobin {
            self.next = (index + 1) % self.core.inflows().len();
        }
        for outflow in self.core.outflow_labels() {
            self.core.create_and_send_packet(&outflow, value.clone())?;
        }
        self.core.inflow_mut(&label)?.clear();
        tracing::debug!(node = %self.core.name(), inflow = %label, "merged packet");
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
