use super::flow::{Inflow, Outflow};
use wfcore::{
    FlowError, Packet, Result, UnusedDataKind, UnusedDataRecord, Value, Variables, WorkflowContext,
    WorkflowError, WrapupResult,
};

/// What a node must do after the shared bookkeeping for a delivered packet
#[derive(Debug)]
pub(crate) enum Received {
    /// End of stream on an inflow; `close_input` is set when the bound
    /// input should be treated as closed
    EndOfStream { close_input: bool },
    /// Data packet; `bindings` are template variables recovered from it
    Data {
        value: Value,
        control: bool,
        bindings: Vec<(String, Value)>,
    },
}

/// State shared by every node kind: flows, variables and the
/// stepping flags
#[derive(Debug, Clone)]
pub struct NodeCore {
    name: Option<String>,
    hidden: bool,
    inflows: Vec<Inflow>,
    outflows: Vec<Outflow>,
    variables: Variables,
    uri_prefix: String,
    run: u64,
    steps_once: bool,
    done_stepping: Option<bool>,
    finished: Option<bool>,
    received_eos: usize,
    all_eos_sent: bool,
    context: Option<WorkflowContext>,
}

impl NodeCore {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name,
            hidden: false,
            inflows: Vec::new(),
            outflows: Vec::new(),
            variables: Variables::new(),
            uri_prefix: String::new(),
            run: 0,
            steps_once: false,
            done_stepping: None,
            finished: None,
            received_eos: 0,
            all_eos_sent: false,
            context: None,
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Hidden nodes relay packets without recording them in the store
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn inflows(&self) -> &[Inflow] {
        &self.inflows
    }

    pub fn outflows(&self) -> &[Outflow] {
        &self.outflows
    }

    pub fn inflow(&self, label: &str) -> Option<&Inflow> {
        self.inflows.iter().find(|i| i.label() == label)
    }

    pub fn outflow(&self, label: &str) -> Option<&Outflow> {
        self.outflows.iter().find(|o| o.label() == label)
    }

    pub(crate) fn inflow_mut(&mut self, label: &str) -> Result<&mut Inflow> {
        let node = self.name().to_string();
        self.inflows
            .iter_mut()
            .find(|i| i.label() == label)
            .ok_or_else(|| missing_flow(&node, "inflow", label))
    }

    pub(crate) fn outflow_mut(&mut self, label: &str) -> Result<&mut Outflow> {
        let node = self.name().to_string();
        self.outflows
            .iter_mut()
            .find(|o| o.label() == label)
            .ok_or_else(|| missing_flow(&node, "outflow", label))
    }

    pub fn inflow_labels(&self) -> Vec<String> {
        self.inflows.iter().map(|i| i.label().to_string()).collect()
    }

    pub fn outflow_labels(&self) -> Vec<String> {
        self.outflows.iter().map(|o| o.label().to_string()).collect()
    }

    pub fn add_inflow(&mut self, inflow: Inflow) -> Result<()> {
        if self.inflow(inflow.label()).is_some() {
            return Err(self.declaration_error(format!("duplicate inflow '{}'", inflow.label())));
        }
        self.inflows.push(inflow);
        Ok(())
    }

    pub fn add_outflow(&mut self, outflow: Outflow) -> Result<()> {
        if self.outflow(outflow.label()).is_some() {
            return Err(self.declaration_error(format!("duplicate outflow '{}'", outflow.label())));
        }
        self.outflows.push(outflow);
        Ok(())
    }

    pub(crate) fn rebind_inflow(&mut self, label: &str, binding: String) -> Result<()> {
        self.inflow_mut(label)?.rebind(binding);
        Ok(())
    }

    pub(crate) fn declaration_error(&self, message: String) -> FlowError {
        WorkflowError::NodeDeclaration {
            node: self.name().to_string(),
            message,
        }
        .into()
    }

    /// Every inflow must be able to keep receiving unless the node has none
    pub(crate) fn check_receive_once(&self) -> Result<()> {
        if !self.inflows.is_empty() && self.inflows.iter().all(Inflow::is_receive_once) {
            return Err(WorkflowError::Configuration(format!(
                "At least one inflow must not receive once on node {}",
                self.name()
            ))
            .into());
        }
        Ok(())
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn remove_variable(&mut self, name: &str) {
        self.variables.remove(name);
    }

    pub fn uri_prefix(&self) -> &str {
        &self.uri_prefix
    }

    pub fn set_uri_prefix(&mut self, prefix: impl Into<String>) {
        self.uri_prefix = prefix.into();
    }

    /// Run number of the enclosing workflow
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn set_run(&mut self, run: u64) {
        self.run = run;
    }

    pub fn steps_once(&self) -> bool {
        self.steps_once
    }

    pub fn set_steps_once(&mut self, steps_once: bool) {
        self.steps_once = steps_once;
    }

    pub fn is_done_stepping(&self) -> Result<bool> {
        self.done_stepping
            .ok_or_else(|| WorkflowError::NodeNotInitialized(self.name().to_string()).into())
    }

    pub fn is_finished(&self) -> Result<bool> {
        self.finished
            .ok_or_else(|| WorkflowError::NodeNotInitialized(self.name().to_string()).into())
    }

    /// Finished, treating an uninitialized node as not finished
    pub fn has_finished(&self) -> bool {
        self.finished.unwrap_or(false)
    }

    pub(crate) fn flag_done_stepping(&mut self) {
        self.done_stepping = Some(true);
    }

    pub(crate) fn flag_finished(&mut self) {
        self.finished = Some(true);
    }

    pub fn all_eos_sent(&self) -> bool {
        self.all_eos_sent
    }

    pub fn all_eos_received(&self) -> bool {
        !self.inflows.is_empty() && self.received_eos >= self.inflows.len()
    }

    pub fn context(&self) -> Option<&WorkflowContext> {
        self.context.as_ref()
    }

    pub(crate) fn configure(&mut self, context: &WorkflowContext) -> Result<()> {
        let name = self.name().to_string();
        let steps_once = self.steps_once;
        for inflow in &mut self.inflows {
            inflow.configure(context.protocols(), &name)?;
        }
        for outflow in &mut self.outflows {
            outflow.configure(context.protocols(), &name, steps_once)?;
        }
        self.context = Some(context.clone());
        Ok(())
    }

    pub(crate) fn initialize(&mut self) {
        for inflow in &mut self.inflows {
            inflow.reset();
        }
        let steps_once = self.steps_once;
        for outflow in &mut self.outflows {
            outflow.initialize(steps_once);
        }
        self.variables.clear();
        self.done_stepping = Some(false);
        self.finished = Some(false);
        self.received_eos = 0;
        self.all_eos_sent = false;
    }

    pub(crate) fn reset(&mut self) {
        for inflow in &mut self.inflows {
            inflow.reset();
        }
        for outflow in &mut self.outflows {
            outflow.clear();
        }
        self.variables.clear();
        self.done_stepping = None;
        self.finished = None;
        self.received_eos = 0;
        self.all_eos_sent = false;
    }

    /// Shared bookkeeping for a packet delivered to inflow `label`.
    ///
    /// End of stream marks the inflow and may end stepping: when every
    /// inflow has closed, or when a required inflow closes.
    pub(crate) fn receive_packet(
        &mut self,
        label: &str,
        packet: Packet,
        optional: bool,
    ) -> Result<Received> {
        let node = self.name().to_string();
        if let Some(context) = &self.context {
            let uri = packet.uri().map(|u| u.to_string()).unwrap_or_default();
            context
                .recorder()
                .packet_received(context.run_id(), &node, label, &uri);
        }

        let inflow = self.inflow_mut(label)?;
        if packet.is_end_of_stream() {
            inflow.mark_end_of_stream();
            let receive_once = inflow.is_receive_once();
            self.received_eos += 1;
            tracing::debug!(node = %node, inflow = %label, "end of stream received");
            if self.received_eos >= self.inflows.len() || (!receive_once && !optional) {
                self.done_stepping = Some(true);
            }
            if !receive_once {
                self.variables.remove(label);
            }
            return Ok(Received::EndOfStream {
                close_input: !receive_once,
            });
        }

        let bindings: Vec<(String, Value)> = inflow
            .template()
            .variable_names()
            .into_iter()
            .map(str::to_string)
            .zip(packet.metadata_values().cloned())
            .collect();
        let control = inflow.is_control();
        let value = packet.data();
        inflow.set_packet(packet);

        for (name, bound) in &bindings {
            self.variables.insert(name.clone(), bound.clone());
        }
        if !control {
            self.variables.insert(label.to_string(), value.clone());
        }
        Ok(Received::Data {
            value,
            control,
            bindings,
        })
    }

    /// Place `packet` on outflow `label`, recording published data in the
    /// packet store unless the node is hidden
    pub(crate) fn send_packet(&mut self, label: &str, packet: Packet) -> Result<()> {
        let node = self.name().to_string();
        let hidden = self.hidden;
        if !packet.is_end_of_stream() {
            if let Some(context) = &self.context {
                for resource in packet.resources() {
                    if !hidden {
                        context.store().put(resource.key.clone(), resource.data.clone());
                    }
                    context.recorder().packet_sent(
                        context.run_id(),
                        &node,
                        label,
                        &resource.uri.to_string(),
                        &resource.data,
                    );
                }
            }
            tracing::debug!(node = %node, outflow = %label, uri = ?packet.uri().map(|u| u.to_string()), "packet sent");
        }
        self.outflow_mut(label)?.send(packet);
        Ok(())
    }

    /// Build a packet for `value` with the node's own variables and send it
    pub(crate) fn create_and_send_packet(&mut self, label: &str, value: Value) -> Result<()> {
        let variables = self.variables.clone();
        self.create_and_send_packet_with(label, value, &variables)
    }

    pub(crate) fn create_and_send_packet_with(
        &mut self,
        label: &str,
        value: Value,
        variables: &Variables,
    ) -> Result<()> {
        let prefix = self.uri_prefix.clone();
        let packet = self.outflow_mut(label)?.create_packet(value, variables, &prefix)?;
        self.send_packet(label, packet)
    }

    /// Send end of stream on one outflow, at most once
    pub(crate) fn send_eos_on(&mut self, label: &str) -> Result<()> {
        if self.outflow_mut(label)?.eos_sent() {
            return Ok(());
        }
        self.send_packet(label, Packet::end_of_stream())
    }

    /// Send end of stream on every outflow
    pub(crate) fn send_eos(&mut self) -> Result<()> {
        for label in self.outflow_labels() {
            self.send_eos_on(&label)?;
        }
        self.all_eos_sent = true;
        tracing::debug!(node = %self.name(), "end of stream sent");
        Ok(())
    }

    /// Clear staged inflow packets; receive-once inflows keep theirs
    /// unless `all` is set
    pub(crate) fn clear_inflows(&mut self, all: bool) {
        for inflow in &mut self.inflows {
            if all || !inflow.is_receive_once() {
                inflow.clear();
            }
        }
    }

    pub(crate) fn clear_outflows(&mut self) {
        for outflow in &mut self.outflows {
            outflow.clear();
        }
    }

    pub(crate) fn get_output_packet(&mut self, label: &str) -> Result<Packet> {
        let node = self.name().to_string();
        self.outflow_mut(label)?.get(&node)
    }

    /// Packets left in inflows, and in outflows that someone listens to
    pub(crate) fn unused_data(&self) -> WrapupResult {
        let mut result = WrapupResult::new();
        for inflow in &self.inflows {
            result.add(UnusedDataRecord::new(
                self.name(),
                inflow.label(),
                UnusedDataKind::Inflow,
                inflow.packet().cloned(),
            ));
        }
        for outflow in self.outflows.iter().filter(|o| o.has_receivers()) {
            result.add(UnusedDataRecord::new(
                self.name(),
                outflow.label(),
                UnusedDataKind::Outflow,
                outflow.peek().cloned(),
            ));
        }
        result
    }

    pub(crate) fn set_outflow_receivers(&mut self, label: &str, has_receivers: bool) -> Result<()> {
        self.outflow_mut(label)?.set_has_receivers(has_receivers);
        Ok(())
    }

    pub(crate) fn finish_wrapup(&mut self) {
        self.done_stepping = None;
        self.finished = None;
    }
}

fn missing_flow(node: &str, kind: &str, label: &str) -> FlowError {
    WorkflowError::NodeDeclaration {
        node: node.to_string(),
        message: format!("no {} named '{}'", kind, label),
    }
    .into()
}
