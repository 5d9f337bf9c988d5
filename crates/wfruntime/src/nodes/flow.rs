use wfcore::{FlowError, Packet, Protocol, ProtocolRegistry, Result, UriTemplate, Value, Variables, WorkflowError};
use std::sync::Arc;

fn resolve_protocol(
    protocols: &ProtocolRegistry,
    node: &str,
    label: &str,
    template: &UriTemplate,
) -> Result<Arc<dyn Protocol>> {
    protocols.get(template.scheme()).ok_or_else(|| {
        WorkflowError::UnknownProtocol {
            node: node.to_string(),
            label: label.to_string(),
            scheme: template.scheme().to_string(),
        }
        .into()
    })
}

/// A node's named input port bound to a URI template
#[derive(Debug, Clone)]
pub struct Inflow {
    label: String,
    template: UriTemplate,
    binding: String,
    protocol: Option<Arc<dyn Protocol>>,
    receive_once: bool,
    packet: Option<Packet>,
    received: bool,
    eos_received: bool,
}

impl Inflow {
    pub fn new(label: impl Into<String>, expression: &str) -> Result<Self> {
        let template = UriTemplate::parse(expression)?;
        Ok(Self {
            label: label.into(),
            binding: template.reduced_path(),
            template,
            protocol: None,
            receive_once: false,
            packet: None,
            received: false,
            eos_received: false,
        })
    }

    /// Inflow that accepts only its first packet in a run
    pub fn receive_once(mut self) -> Self {
        self.receive_once = true;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    /// Reduced path that outflows are matched against
    pub fn binding(&self) -> &str {
        &self.binding
    }

    /// Redirect this inflow to a different upstream path, keeping its
    /// template for variable extraction
    pub fn rebind(&mut self, binding: impl Into<String>) {
        self.binding = binding.into();
    }

    pub fn is_receive_once(&self) -> bool {
        self.receive_once
    }

    pub fn is_control(&self) -> bool {
        self.protocol.as_ref().map(|p| p.is_control()).unwrap_or(false)
    }

    pub fn packet(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    pub fn has_received(&self) -> bool {
        self.received
    }

    pub fn eos_received(&self) -> bool {
        self.eos_received
    }

    pub(crate) fn configure(&mut self, protocols: &ProtocolRegistry, node: &str) -> Result<()> {
        self.protocol = Some(resolve_protocol(protocols, node, &self.label, &self.template)?);
        Ok(())
    }

    pub(crate) fn set_packet(&mut self, packet: Packet) {
        self.packet = Some(packet);
        self.received = true;
    }

    pub(crate) fn mark_end_of_stream(&mut self) {
        self.eos_received = true;
    }

    pub(crate) fn clear(&mut self) {
        self.packet = None;
    }

    pub(crate) fn reset(&mut self) {
        self.packet = None;
        self.received = false;
        self.eos_received = false;
    }
}

impl PartialEq for Inflow {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.template == other.template
    }
}

/// A node's named output port bound to a URI template
#[derive(Debug, Clone)]
pub struct Outflow {
    label: String,
    template: UriTemplate,
    protocol: Option<Arc<dyn Protocol>>,
    use_suffix: bool,
    count: u64,
    packet: Option<Packet>,
    has_receivers: bool,
    eos_sent: bool,
}

impl Outflow {
    pub fn new(label: impl Into<String>, expression: &str) -> Result<Self> {
        Ok(Self {
            label: label.into(),
            template: UriTemplate::parse(expression)?,
            protocol: None,
            use_suffix: false,
            count: 0,
            packet: None,
            has_receivers: false,
            eos_sent: false,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    pub fn binding(&self) -> String {
        self.template.reduced_path()
    }

    pub fn has_receivers(&self) -> bool {
        self.has_receivers
    }

    pub(crate) fn set_has_receivers(&mut self, has_receivers: bool) {
        self.has_receivers = has_receivers;
    }

    pub fn packet_ready(&self) -> bool {
        self.packet.is_some()
    }

    pub fn eos_sent(&self) -> bool {
        self.eos_sent
    }

    pub fn uses_suffix(&self) -> bool {
        self.use_suffix
    }

    /// Resolve the protocol and check that successive packets can be told
    /// apart: a node that fires more than once needs either a template
    /// variable or a protocol that appends suffixes
    pub(crate) fn configure(
        &mut self,
        protocols: &ProtocolRegistry,
        node: &str,
        steps_once: bool,
    ) -> Result<()> {
        let protocol = resolve_protocol(protocols, node, &self.label, &self.template)?;
        if !steps_once && self.template.variable_count() == 0 && !protocol.supports_suffixes() {
            return Err(WorkflowError::Configuration(format!(
                "URI template for outflow {} must include at least one variable.",
                self.label
            ))
            .into());
        }
        self.protocol = Some(protocol);
        Ok(())
    }

    pub(crate) fn initialize(&mut self, steps_once: bool) {
        self.use_suffix = self.template.variable_count() == 0 && !steps_once;
        self.count = 0;
        self.packet = None;
        self.eos_sent = false;
    }

    /// Package `data` at this outflow's next URI
    pub(crate) fn create_packet(
        &mut self,
        data: Value,
        variables: &Variables,
        prefix: &str,
    ) -> Result<Packet> {
        let protocol = self.protocol.clone().ok_or_else(|| {
            FlowError::illegal_state(format!("Outflow {} used before configuration", self.label))
        })?;
        let suffix = if self.use_suffix {
            self.count += 1;
            format!("/{}", self.count)
        } else {
            String::new()
        };
        let (uri, bindings) = self.template.expand(variables, prefix, &suffix)?;
        Ok(protocol.create_packet(&self.template, uri, bindings, data))
    }

    pub(crate) fn send(&mut self, packet: Packet) {
        if packet.is_end_of_stream() {
            self.eos_sent = true;
        }
        self.packet = Some(packet);
    }

    /// Remove and return the pending packet
    pub(crate) fn get(&mut self, node: &str) -> Result<Packet> {
        self.packet.take().ok_or_else(|| {
            FlowError::illegal_state(format!(
                "Request for packet on empty outflow '{}' on node {}",
                self.label, node
            ))
        })
    }

    pub fn peek(&self) -> Option<&Packet> {
        self.packet.as_ref()
    }

    pub(crate) fn clear(&mut self) {
        self.packet = None;
    }
}
