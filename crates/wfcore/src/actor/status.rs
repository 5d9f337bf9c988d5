use super::signature::ActorSignature;
use std::collections::HashMap;

/// Per-step status visible to an actor body: the step counter and the
/// enable flags of its inputs and outputs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActorStatus {
    step_count: u64,
    input_enables: HashMap<String, bool>,
    output_enables: HashMap<String, bool>,
}

impl ActorStatus {
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn set_step_count(&mut self, count: u64) {
        self.step_count = count;
    }

    pub fn input_enabled(&self, label: &str) -> bool {
        self.input_enables.get(label).copied().unwrap_or(true)
    }

    pub fn enable_input(&mut self, label: &str) {
        self.input_enables.insert(label.to_string(), true);
    }

    pub fn disable_input(&mut self, label: &str) {
        self.input_enables.insert(label.to_string(), false);
    }

    pub fn output_enabled(&self, label: &str) -> bool {
        self.output_enables.get(label).copied().unwrap_or(true)
    }

    pub fn enable_output(&mut self, label: &str) {
        self.output_enables.insert(label.to_string(), true);
    }

    pub fn disable_output(&mut self, label: &str) {
        self.output_enables.insert(label.to_string(), false);
    }

    pub fn output_enables(&self) -> &HashMap<String, bool> {
        &self.output_enables
    }

    pub(crate) fn reset_input_enables(&mut self, signature: &ActorSignature) {
        self.input_enables = signature
            .inputs
            .values()
            .map(|port| (port.name.clone(), port.default_enabled))
            .collect();
    }

    pub(crate) fn reset_output_enables(&mut self, signature: &ActorSignature) {
        self.output_enables = signature
            .outputs
            .values()
            .map(|port| (port.name.clone(), port.default_enabled))
            .collect();
    }
}
