use super::{NodeCore, NodeKind, WorkflowNode};
use super::flow::{Inflow, Outflow};
use async_trait::async_trait;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use wfcore::{Result, Value, WrapupResult};

/// Entry point that publishes a workflow's inputs into its graph, once
/// per run
pub struct InPortal {
    core: NodeCore,
    inputs: HashMap<String, Value>,
}

impl InPortal {
    pub fn new() -> Self {
        let mut core = NodeCore::new(Some("InPortal".to_string()));
        core.set_steps_once(true);
        Self {
            core,
            inputs: HashMap::new(),
        }
    }

    pub fn with_outflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_outflow(Outflow::new(label, expression)?)?;
        Ok(self)
    }

    /// Stage a value for outflow `label`, published on the next firing
    pub fn set_input(&mut self, label: impl Into<String>, value: Value) {
        self.inputs.insert(label.into(), value);
    }

    pub fn clear_inputs(&mut self) {
        self.inputs.clear();
    }
}

impl Default for InPortal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowNode for InPortal {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> NodeKind {
        NodeKind::InPortal
    }

    fn ready_for_input_packet(&self, _label: &str) -> bool {
        false
    }

    async fn trigger(&mut self) -> Result<bool> {
        if self.core.is_finished()? || self.core.outflows().iter().any(Outflow::packet_ready) {
            return Ok(false);
        }
        if self.core.is_done_stepping()? {
            self.core.send_eos()?;
            self.core.flag_finished();
            return Ok(true);
        }
        self.core.flag_done_stepping();
        for label in self.core.outflow_labels() {
            if let Some(value) = self.inputs.get(&label).cloned() {
                self.core.set_variable(label.clone(), value.clone());
                self.core.create_and_send_packet(&label, value)?;
            }
        }
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Exit point collecting the first value reaching each of its inflows
pub struct OutPortal {
    core: NodeCore,
    outputs: BTreeMap<String, Value>,
}

impl OutPortal {
    pub fn new() -> Self {
        Self {
            core: NodeCore::new(Some("OutPortal".to_string())),
            outputs: BTreeMap::new(),
        }
    }

    pub fn with_inflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_inflow(Inflow::new(label, expression)?)?;
        Ok(self)
    }

    pub fn output(&self, label: &str) -> Option<&Value> {
        self.outputs.get(label)
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    fn all_outputs_arrived(&self) -> bool {
        self.core
            .inflows()
            .iter()
            .all(|i| i.eos_received() || self.outputs.contains_key(i.label()))
    }
}

impl Default for OutPortal {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowNode for OutPortal {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> NodeKind {
        NodeKind::OutPortal
    }

    async fn initialize(&mut self) -> Result<()> {
        self.core.initialize();
        self.outputs.clear();
        Ok(())
    }

    fn input_is_optional(&self, _label: &str) -> bool {
        true
    }

    fn ready_for_input_packet(&self, label: &str) -> bool {
        !self.core.has_finished()
            && self
                .core
                .inflow(label)
                .map(|i| !i.eos_received() && !self.outputs.contains_key(label))
                .unwrap_or(false)
    }

    fn load_input(&mut self, label: &str, value: Value) -> Result<()> {
        self.outputs.insert(label.to_string(), value);
        Ok(())
    }

    fn all_inputs_staged(&self) -> bool {
        self.all_outputs_arrived()
    }

    async fn trigger(&mut self) -> Result<bool> {
        if self.core.is_finished()? || !self.all_outputs_arrived() {
            return Ok(false);
        }
        self.core.clear_inflows(true);
        self.core.flag_done_stepping();
        self.core.flag_finished();
        Ok(true)
    }

    async fn wrapup(&mut self) -> Result<WrapupResult> {
        self.core.clear_inflows(true);
        let result = self.core.unused_data();
        self.core.finish_wrapup();
        Ok(result)
    }

    fn reset(&mut self) {
        self.core.reset();
        self.outputs.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
