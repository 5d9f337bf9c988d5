use super::{NodeCore, NodeKind, WorkflowNode};
use super::flow::{Inflow, Outflow};
use crate::sequences::Sequences;
use async_trait::async_trait;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use wfcore::{
    Actor, ActorCompletionService, ActorError, ActorState, Completion, FlowError,
    OrderedActorCompletionService, Packet, Result, SynchronousActorCompletionService,
    UnorderedActorCompletionService, Value, WorkflowContext, WorkflowError, WrapupResult,
};

/// Per-node knobs for an [`ActorNode`]
#[derive(Debug, Clone)]
pub struct ActorNodeConfig {
    /// Steps allowed in flight at once; above 1 the actor is cloned per step
    pub max_concurrency: usize,
    /// Deliver concurrent results in submission order
    pub ordered: bool,
    pub steps_once: bool,
    pub end_flow_on_null: bool,
    pub end_flow_on_no_output: bool,
    pub end_flow_on_actor_exception: bool,
    pub repeat_values: bool,
    pub constants: BTreeMap<String, Value>,
    pub initial_values: BTreeMap<String, Value>,
    pub sequences: BTreeMap<String, Vec<Value>>,
    /// Error kind to outflow label; `*` matches any kind
    pub exception_outflows: BTreeMap<String, String>,
}

impl Default for ActorNodeConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 1,
            ordered: true,
            steps_once: false,
            end_flow_on_null: false,
            end_flow_on_no_output: false,
            end_flow_on_actor_exception: false,
            repeat_values: false,
            constants: BTreeMap::new(),
            initial_values: BTreeMap::new(),
            sequences: BTreeMap::new(),
            exception_outflows: BTreeMap::new(),
        }
    }
}

/// Node that steps a single actor, binding inflows to its inputs and its
/// outputs to outflows
pub struct ActorNode {
    core: NodeCore,
    actor: Actor,
    config: ActorNodeConfig,
    sequences: Sequences,
    service: Option<Arc<dyn ActorCompletionService>>,
    shutdown_requested: bool,
    step_count: u64,
}

impl ActorNode {
    pub fn new(actor: Actor) -> Self {
        Self {
            core: NodeCore::new(None),
            actor,
            config: ActorNodeConfig::default(),
            sequences: Sequences::new(),
            service: None,
            shutdown_requested: false,
            step_count: 0,
        }
    }

    pub fn named(name: impl Into<String>, actor: Actor) -> Self {
        let mut node = Self::new(actor);
        node.core.set_name(name);
        node
    }

    pub fn with_inflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_inflow(Inflow::new(label, expression)?)?;
        Ok(self)
    }

    /// Inflow that accepts a single packet per run
    pub fn with_receive_once_inflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_inflow(Inflow::new(label, expression)?.receive_once())?;
        Ok(self)
    }

    pub fn with_outflow(mut self, label: &str, expression: &str) -> Result<Self> {
        self.core.add_outflow(Outflow::new(label, expression)?)?;
        Ok(self)
    }

    /// Route step failures of `kind` to a new outflow `label`
    pub fn with_exception_outflow(mut self, kind: &str, label: &str, expression: &str) -> Result<Self> {
        self.core.add_outflow(Outflow::new(label, expression)?)?;
        self.config
            .exception_outflows
            .insert(kind.to_string(), label.to_string());
        Ok(self)
    }

    pub fn with_config(mut self, config: ActorNodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.constants.insert(name.into(), value.into());
        self
    }

    pub fn with_initial_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.initial_values.insert(name.into(), value.into());
        self
    }

    pub fn with_sequence(mut self, name: impl Into<String>, values: Vec<Value>) -> Self {
        self.config.sequences.insert(name.into(), values);
        self
    }

    pub fn with_repeat_values(mut self, repeat: bool) -> Self {
        self.config.repeat_values = repeat;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize, ordered: bool) -> Self {
        self.config.max_concurrency = max_concurrency.max(1);
        self.config.ordered = ordered;
        self
    }

    pub fn with_steps_once(mut self, steps_once: bool) -> Self {
        self.config.steps_once = steps_once;
        self
    }

    pub fn with_end_flow_on_null(mut self, enabled: bool) -> Self {
        self.config.end_flow_on_null = enabled;
        self
    }

    pub fn with_end_flow_on_no_output(mut self, enabled: bool) -> Self {
        self.config.end_flow_on_no_output = enabled;
        self
    }

    pub fn with_end_flow_on_actor_exception(mut self, enabled: bool) -> Self {
        self.config.end_flow_on_actor_exception = enabled;
        self
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn actor_mut(&mut self) -> &mut Actor {
        &mut self.actor
    }

    pub fn config(&self) -> &ActorNodeConfig {
        &self.config
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    fn is_exception_outflow(&self, label: &str) -> bool {
        self.config.exception_outflows.values().any(|l| l == label)
    }

    fn data_outflow_labels(&self) -> Vec<String> {
        self.core
            .outflow_labels()
            .into_iter()
            .filter(|label| !self.is_exception_outflow(label))
            .collect()
    }

    fn configuration_error(message: String) -> FlowError {
        WorkflowError::Configuration(message).into()
    }

    /// Match inflows and outflows against the actor's ports, declaring
    /// implicit ports on actors that name none
    fn check_ports(&mut self) -> Result<()> {
        let node = self.core.name().to_string();
        let actor_name = self.actor.name().to_string();

        let implicit_inputs = self.actor.signature().inputs.is_empty();
        for inflow in self.core.inflows() {
            let label = inflow.label();
            if inflow.is_control() {
                if self.actor.has_input(label) {
                    return Err(self.core.declaration_error(format!(
                        "control inflow '{}' has the same name as an input of actor {}",
                        label, actor_name
                    )));
                }
            } else if implicit_inputs {
                self.actor.add_implicit_input(label)?;
            } else if !self.actor.has_input(label) {
                return Err(Self::configuration_error(format!(
                    "Actor {} does not accept input variable '{}'.",
                    actor_name, label
                )));
            }
        }
        if implicit_inputs {
            let bound: Vec<String> = self
                .config
                .constants
                .keys()
                .chain(self.config.initial_values.keys())
                .chain(self.config.sequences.keys())
                .cloned()
                .collect();
            for name in bound {
                self.actor.add_implicit_input(&name)?;
            }
        }

        let implicit_outputs = self.actor.signature().outputs.is_empty();
        for label in self.data_outflow_labels() {
            if implicit_outputs {
                self.actor.add_implicit_output(&label)?;
            } else if !self.actor.has_output(&label) {
                return Err(Self::configuration_error(format!(
                    "Actor {} does not produce output variable '{}' named by node {}.",
                    actor_name, label, node
                )));
            }
        }
        Ok(())
    }

    /// Bind a value to the node variable, the actor input and the inflow
    /// of the same name, whichever exist
    fn bind_value(&mut self, name: &str, value: &Value) -> Result<()> {
        if let Ok(inflow) = self.core.inflow_mut(name) {
            inflow.set_packet(Packet::from_value(value.clone()));
        }
        self.core.set_variable(name, value.clone());
        if self.actor.has_input(name) {
            self.actor.set_input_value(name, value.clone())?;
        }
        Ok(())
    }

    fn service(&self) -> Result<Arc<dyn ActorCompletionService>> {
        self.service
            .clone()
            .ok_or_else(|| WorkflowError::NodeNotInitialized(self.core.name().to_string()).into())
    }

    fn shutdown_service(&mut self) -> Result<()> {
        self.core.flag_done_stepping();
        self.shutdown_requested = true;
        self.service()?.shutdown();
        Ok(())
    }

    fn record_step(&self, success: bool) {
        if let Some(context) = self.core.context() {
            context
                .recorder()
                .step_completed(context.run_id(), self.core.name(), self.step_count, success);
        }
    }

    fn handle_exception(&mut self, error: ActorError) -> Result<()> {
        let node = self.core.name().to_string();
        let route = self
            .config
            .exception_outflows
            .get(error.kind())
            .or_else(|| self.config.exception_outflows.get("*"))
            .cloned();
        if let Some(label) = route {
            tracing::debug!(node = %node, outflow = %label, kind = %error.kind(), "routing actor exception");
            let message = match &error {
                ActorError::Runtime { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            let report = HashMap::from([
                ("actor".to_string(), Value::from(error.actor())),
                ("kind".to_string(), Value::from(error.kind())),
                ("message".to_string(), Value::String(message)),
            ]);
            return self.core.create_and_send_packet(&label, Value::Object(report));
        }
        if self.config.end_flow_on_actor_exception {
            tracing::warn!(node = %node, error = %error, "ending flow after actor exception");
            self.shutdown_service()?;
            self.core.send_eos()?;
            self.core.flag_finished();
            return Ok(());
        }
        Err(WorkflowError::ActorException {
            node,
            actor: self.actor.name().to_string(),
            source: error,
        }
        .into())
    }
}

#[async_trait]
impl WorkflowNode for ActorNode {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Actor
    }

    fn elaborate(&mut self) -> Result<()> {
        if self.actor.state() == ActorState::Constructed {
            self.actor.after_properties_set()?;
        }
        if self.actor.state() == ActorState::PropertiesSet {
            self.actor.elaborate()?;
        }
        for label in self.config.exception_outflows.values() {
            if self.core.outflow(label).is_none() {
                return Err(self
                    .core
                    .declaration_error(format!("no outflow '{}' for routed exceptions", label)));
            }
        }
        let mut sequences = Sequences::new();
        for (name, values) in &self.config.sequences {
            sequences.insert(name.clone(), values.clone());
        }
        sequences.set_repeat(self.config.repeat_values);
        let fires_once = !self.actor.is_stateful()
            && self.core.inflows().is_empty()
            && sequences.max_len() <= 1;
        self.sequences = sequences;
        if self.config.steps_once || fires_once {
            self.core.set_steps_once(true);
        }
        self.core.check_receive_once()
    }

    fn configure(&mut self, context: &WorkflowContext) -> Result<()> {
        self.core.configure(context)?;
        self.check_ports()?;
        if self.actor.state() == ActorState::Elaborated {
            self.actor.configure()?;
        }
        if self.config.max_concurrency > 1 && !self.actor.is_cloneable() {
            return Err(Self::configuration_error(format!(
                "Uncloneable actor {} cannot be used within concurrent node {}",
                self.actor.name(),
                self.core.name()
            )));
        }
        let node = self.core.name().to_string();
        self.sequences.configure(&node)
    }

    async fn initialize(&mut self) -> Result<()> {
        self.core.initialize();
        // a run that failed part way leaves the actor short of WRAPPED_UP
        if matches!(
            self.actor.state(),
            ActorState::Initialized | ActorState::Stepped
        ) {
            self.actor.reset();
        }
        self.actor.initialize().await?;
        self.sequences.reset();
        let initial: Vec<(String, Value)> = self
            .config
            .initial_values
            .iter()
            .chain(&self.config.constants)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, value) in &initial {
            self.bind_value(name, value)?;
        }

        let max = self.config.max_concurrency;
        let service: Arc<dyn ActorCompletionService> = if max > 1 {
            if self.config.ordered {
                Arc::new(OrderedActorCompletionService::new(max + 1))
            } else {
                Arc::new(UnorderedActorCompletionService::new(max + 1))
            }
        } else {
            Arc::new(SynchronousActorCompletionService::new())
        };
        service.start()?;
        self.service = Some(service);
        self.shutdown_requested = false;
        self.step_count = 0;
        Ok(())
    }

    fn input_is_optional(&self, label: &str) -> bool {
        self.actor.input_is_optional(label)
    }

    fn ready_for_input_packet(&self, label: &str) -> bool {
        let Some(inflow) = self.core.inflow(label) else {
            return false;
        };
        if inflow.eos_received() || inflow.packet().is_some() {
            return false;
        }
        if inflow.is_receive_once() && inflow.has_received() {
            return false;
        }
        inflow.is_control() || self.actor.ready_for_input(label)
    }

    fn load_input(&mut self, label: &str, value: Value) -> Result<()> {
        self.actor.set_input_value(label, value)?;
        Ok(())
    }

    fn load_variable(&mut self, name: &str, value: Value) -> Result<()> {
        if self.actor.has_input(name) && self.core.inflow(name).is_none() {
            self.actor.set_input_value(name, value)?;
        }
        Ok(())
    }

    async fn start_trigger(&mut self) -> Result<bool> {
        if self.core.is_finished()? {
            return Ok(false);
        }
        if self.core.outflows().iter().any(Outflow::packet_ready) {
            return Ok(false);
        }
        if self.core.is_done_stepping()? {
            if self.shutdown_requested {
                return Ok(false);
            }
            self.shutdown_service()?;
            return Ok(true);
        }
        if !self.all_inputs_staged() {
            return Ok(false);
        }
        if !self.sequences.is_empty() {
            let bundle = self.sequences.next_bundle();
            if bundle.iter().any(|(_, value)| value.is_null()) {
                self.shutdown_service()?;
                return Ok(true);
            }
            for (name, value) in &bundle {
                self.core.set_variable(name.clone(), value.clone());
                if self.actor.has_input(name) {
                    self.actor.set_input_value(name, value.clone())?;
                }
            }
        }

        self.core.clear_inflows(false);
        self.step_count += 1;
        self.core.set_variable("STEP", Value::from(self.step_count));
        self.core.set_variable("RUN", Value::from(self.core.run()));
        self.actor.set_step_count(self.step_count);
        self.actor.reset_input_enables();

        let service = self.service()?;
        let variables = self.core.variables().clone();
        tracing::debug!(node = %self.core.name(), step = self.step_count, "submitting step");
        service.submit(&mut self.actor, variables).await?;
        if let Some(context) = self.core.context() {
            context
                .recorder()
                .step_started(context.run_id(), self.core.name(), self.step_count);
        }
        if self.core.steps_once() {
            self.core.flag_done_stepping();
        }
        Ok(true)
    }

    async fn finish_trigger(&mut self, completion: Option<Completion>) -> Result<()> {
        if self.core.is_finished()? {
            return Ok(());
        }
        let mut runner = match completion {
            None => return Ok(()),
            Some(Completion::EndOfActorRunners) => {
                self.core.send_eos()?;
                self.core.flag_finished();
                return Ok(());
            }
            Some(Completion::Runner(runner)) => runner,
        };

        if let Some(error) = runner.take_exception() {
            self.record_step(false);
            return self.handle_exception(error);
        }
        self.record_step(true);
        if self.core.steps_once() {
            self.core.flag_done_stepping();
        }

        let mut variables = runner.variables().clone();
        for (name, value) in runner.outputs() {
            if value.is_null() {
                self.core.remove_variable(name);
            } else {
                self.core.set_variable(name.clone(), value.clone());
                variables.insert(name.clone(), value.clone());
            }
        }

        for label in self.data_outflow_labels() {
            let enabled = runner.output_enabled(&label);
            let value = runner.output_value(&label).cloned().unwrap_or(Value::Null);
            if (enabled && value.is_null() && self.config.end_flow_on_null)
                || (!enabled && self.config.end_flow_on_no_output)
            {
                self.core.flag_done_stepping();
                self.core.send_eos_on(&label)?;
                return Ok(());
            }
            if enabled {
                self.core.create_and_send_packet_with(&label, value, &variables)?;
            }
        }
        Ok(())
    }

    async fn trigger(&mut self) -> Result<bool> {
        if !self.start_trigger().await? {
            return Ok(false);
        }
        let completion = self.service()?.take().await?;
        self.finish_trigger(Some(completion)).await?;
        Ok(true)
    }

    fn completion_service(&self) -> Option<Arc<dyn ActorCompletionService>> {
        self.service.clone()
    }

    fn max_concurrent_steps(&self) -> usize {
        self.config.max_concurrency.max(1)
    }

    async fn wrapup(&mut self) -> Result<WrapupResult> {
        if matches!(
            self.actor.state(),
            ActorState::Initialized | ActorState::Stepped
        ) {
            self.actor.wrapup().await?;
        }
        let result = self.core.unused_data();
        self.core.finish_wrapup();
        Ok(result)
    }

    async fn dispose(&mut self) -> Result<()> {
        match self.actor.state() {
            ActorState::Initialized | ActorState::Stepped => {
                self.actor.wrapup().await?;
                self.actor.dispose()?;
            }
            ActorState::WrappedUp => self.actor.dispose()?,
            _ => {}
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.core.reset();
        self.actor.reset();
        self.sequences.reset();
        self.service = None;
        self.shutdown_requested = false;
        self.step_count = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
