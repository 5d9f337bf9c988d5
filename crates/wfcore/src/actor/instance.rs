use super::body::{ActorBody, ActorHooks, FnActor, StepIo};
use super::signature::{ActorSignature, PortSignature};
use super::state::ActorState;
use super::status::ActorStatus;
use crate::{ActorError, StepError, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Builds a fresh body for a clone when the body cannot duplicate itself
pub type BodyFactory = Arc<dyn Fn() -> Result<Box<dyn ActorBody>, StepError> + Send + Sync>;

/// The static part of an actor, shared unchanged by its clones
#[derive(Clone)]
pub struct ActorDefinition {
    pub signature: ActorSignature,
    pub settings: BTreeMap<String, Value>,
    pub stateful: bool,
    /// Explicit cloneability; when unset, stateless actors are cloneable
    pub cloneable: Option<bool>,
    /// Hooks the body must provide; checked at configure
    pub required_hooks: ActorHooks,
    pub factory: Option<BodyFactory>,
}

impl Default for ActorDefinition {
    fn default() -> Self {
        Self {
            signature: ActorSignature::default(),
            settings: BTreeMap::new(),
            stateful: false,
            cloneable: None,
            required_hooks: ActorHooks::NONE,
            factory: None,
        }
    }
}

/// A unit of computation with a strict lifecycle.
///
/// ```text
/// CONSTRUCTED -> PROPERTIES_SET -> ELABORATED -> CONFIGURED -> INITIALIZED
///     -> STEPPED (repeatable) -> WRAPPED_UP -> DISPOSED
/// ```
pub struct Actor {
    name: String,
    definition: ActorDefinition,
    state: ActorState,
    body: Box<dyn ActorBody>,
    hooks: ActorHooks,
    fresh_body: bool,
    inputs: HashMap<String, Value>,
    outputs: HashMap<String, Value>,
    state_values: HashMap<String, Value>,
    status: ActorStatus,
    run_count: u64,
}

impl Actor {
    pub fn new(name: impl Into<String>, body: impl ActorBody + 'static) -> Self {
        Self::from_boxed(name, Box::new(body))
    }

    pub fn from_boxed(name: impl Into<String>, body: Box<dyn ActorBody>) -> Self {
        Self {
            name: name.into(),
            definition: ActorDefinition::default(),
            state: ActorState::Constructed,
            body,
            hooks: ActorHooks::NONE,
            fresh_body: true,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            state_values: HashMap::new(),
            status: ActorStatus::default(),
            run_count: 0,
        }
    }

    /// Actor whose step is a closure
    pub fn from_fn<F>(name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&mut StepIo<'_>) -> Result<(), StepError> + Send + Sync + 'static,
    {
        Self::new(name, FnActor::new(step))
    }

    pub fn with_input(mut self, port: PortSignature) -> Self {
        self.definition.signature.inputs.insert(port.name.clone(), port);
        self
    }

    pub fn with_output(mut self, port: PortSignature) -> Self {
        self.definition.signature.outputs.insert(port.name.clone(), port);
        self
    }

    pub fn with_state(mut self, port: PortSignature) -> Self {
        self.definition.signature.state.insert(port.name.clone(), port);
        self
    }

    pub fn with_setting(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.definition.settings.insert(name.into(), value.into());
        self
    }

    pub fn with_stateful(mut self, stateful: bool) -> Self {
        self.definition.stateful = stateful;
        self
    }

    pub fn with_cloneable(mut self, cloneable: bool) -> Self {
        self.definition.cloneable = Some(cloneable);
        self
    }

    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn ActorBody>, StepError> + Send + Sync + 'static,
    {
        self.definition.factory = Some(Arc::new(factory));
        self
    }

    pub fn requiring_hooks(mut self, hooks: ActorHooks) -> Self {
        self.definition.required_hooks = hooks;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn definition(&self) -> &ActorDefinition {
        &self.definition
    }

    pub fn signature(&self) -> &ActorSignature {
        &self.definition.signature
    }

    pub fn is_stateful(&self) -> bool {
        self.definition.stateful || !self.definition.signature.state.is_empty()
    }

    pub fn is_cloneable(&self) -> bool {
        self.definition.cloneable.unwrap_or(!self.is_stateful())
    }

    pub fn has_input(&self, label: &str) -> bool {
        self.definition.signature.inputs.contains_key(label)
    }

    pub fn has_output(&self, label: &str) -> bool {
        self.definition.signature.outputs.contains_key(label)
    }

    pub fn input_is_optional(&self, label: &str) -> bool {
        self.definition
            .signature
            .input(label)
            .map(|port| port.optional)
            .unwrap_or(false)
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.definition.signature.inputs.keys().map(String::as_str).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.definition.signature.outputs.keys().map(String::as_str).collect()
    }

    pub fn input_value(&self, label: &str) -> Option<&Value> {
        self.inputs.get(label)
    }

    pub fn output_value(&self, label: &str) -> Option<&Value> {
        self.outputs.get(label)
    }

    pub fn outputs(&self) -> &HashMap<String, Value> {
        &self.outputs
    }

    pub fn state_value(&self, label: &str) -> Option<&Value> {
        self.state_values.get(label)
    }

    pub fn status(&self) -> &ActorStatus {
        &self.status
    }

    pub fn run_count(&self) -> u64 {
        self.run_count
    }

    pub fn set_step_count(&mut self, count: u64) {
        self.status.set_step_count(count);
    }

    /// Declare an input the signature does not name. Only legal before
    /// configuration; used when a node binds to an actor with no declared
    /// inputs.
    pub fn add_implicit_input(&mut self, label: &str) -> Result<(), ActorError> {
        self.require("add an input", &[ActorState::Constructed, ActorState::PropertiesSet, ActorState::Elaborated])?;
        self.definition
            .signature
            .inputs
            .entry(label.to_string())
            .or_insert_with(|| PortSignature::new(label).nullable());
        Ok(())
    }

    pub fn add_implicit_output(&mut self, label: &str) -> Result<(), ActorError> {
        self.require("add an output", &[ActorState::Constructed, ActorState::PropertiesSet, ActorState::Elaborated])?;
        self.definition
            .signature
            .outputs
            .entry(label.to_string())
            .or_insert_with(|| PortSignature::new(label).nullable());
        Ok(())
    }

    fn require(&self, operation: &'static str, allowed: &[ActorState]) -> Result<(), ActorError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ActorError::IllegalState {
                actor: self.name.clone(),
                operation,
                state: self.state,
            })
        }
    }

    fn runtime_error(&self, hook: &'static str, source: StepError) -> ActorError {
        ActorError::Runtime {
            actor: self.name.clone(),
            hook,
            source,
        }
    }

    pub fn after_properties_set(&mut self) -> Result<(), ActorError> {
        self.require("set properties", &[ActorState::Constructed])?;
        if self.name.trim().is_empty() {
            return Err(ActorError::Declaration {
                actor: self.name.clone(),
                message: "actor name must not be empty".to_string(),
            });
        }
        self.state = ActorState::PropertiesSet;
        Ok(())
    }

    pub fn elaborate(&mut self) -> Result<(), ActorError> {
        self.require("elaborate", &[ActorState::PropertiesSet])?;
        let signature = &self.definition.signature;
        let ports = signature
            .inputs
            .iter()
            .chain(&signature.outputs)
            .chain(&signature.state);
        for (key, port) in ports {
            if key.trim().is_empty() || *key != port.name {
                return Err(ActorError::Declaration {
                    actor: self.name.clone(),
                    message: format!("malformed port declaration '{}'", key),
                });
            }
        }
        for name in signature.state.keys() {
            if signature.inputs.contains_key(name) {
                return Err(ActorError::Declaration {
                    actor: self.name.clone(),
                    message: format!("'{}' is declared as both an input and a state variable", name),
                });
            }
        }
        self.state = ActorState::Elaborated;
        Ok(())
    }

    /// Resolve the body's hooks against those the definition requires
    pub fn configure(&mut self) -> Result<(), ActorError> {
        self.require("configure", &[ActorState::Elaborated])?;
        let available = self.body.hooks();
        let missing = self.definition.required_hooks.missing_from(&available);
        if !missing.is_empty() {
            return Err(ActorError::Declaration {
                actor: self.name.clone(),
                message: format!("unresolved hook(s): {}", missing.join(", ")),
            });
        }
        self.hooks = available;
        self.state = ActorState::Configured;
        Ok(())
    }

    pub async fn initialize(&mut self) -> Result<(), ActorError> {
        self.require(
            "initialize",
            &[ActorState::Configured, ActorState::WrappedUp],
        )?;
        self.inputs.clear();
        self.outputs.clear();
        self.state_values = self
            .definition
            .signature
            .state
            .values()
            .filter_map(|port| port.default.clone().map(|v| (port.name.clone(), v)))
            .collect();
        for port in self.definition.signature.inputs.values() {
            if let Some(default) = &port.default {
                self.inputs.insert(port.name.clone(), default.clone());
            }
        }
        self.status = ActorStatus::default();
        self.status.reset_input_enables(&self.definition.signature);
        self.status.reset_output_enables(&self.definition.signature);
        self.run_count = 0;
        self.run_initialize_hook().await?;
        self.state = ActorState::Initialized;
        Ok(())
    }

    async fn run_initialize_hook(&mut self) -> Result<(), ActorError> {
        if !self.hooks.initialize {
            return Ok(());
        }
        let mut scratch = HashMap::new();
        let no_variables = HashMap::new();
        let result = {
            let mut io = StepIo::new(
                &self.name,
                &self.inputs,
                &mut scratch,
                &mut self.state_values,
                &mut self.status,
                &self.definition.settings,
                &no_variables,
            );
            self.body.initialize(&mut io).await
        };
        result.map_err(|e| self.runtime_error("initialize", e))
    }

    /// Bind an input value; a bound input is not ready for another value
    /// until input enables are reset
    pub fn set_input_value(&mut self, label: &str, value: Value) -> Result<(), ActorError> {
        if let Some(port) = self.definition.signature.input(label) {
            if value.is_null() && !port.nullable {
                return Err(ActorError::NullInput {
                    actor: self.name.clone(),
                    input: label.to_string(),
                });
            }
        }
        self.inputs.insert(label.to_string(), value);
        self.status.disable_input(label);
        Ok(())
    }

    pub fn ready_for_input(&self, label: &str) -> bool {
        self.status.input_enabled(label)
    }

    pub fn reset_input_enables(&mut self) {
        self.status.reset_input_enables(&self.definition.signature);
    }

    pub fn output_enabled(&self, label: &str) -> bool {
        self.status.output_enabled(label)
    }

    fn check_inputs(&self) -> Result<(), ActorError> {
        for port in self.definition.signature.inputs.values() {
            let Some(value) = self.inputs.get(&port.name) else {
                continue;
            };
            if value.is_null() && !port.nullable {
                return Err(ActorError::NullInput {
                    actor: self.name.clone(),
                    input: port.name.clone(),
                });
            }
            if let Some(expected) = &port.type_name {
                if !value.conforms_to(expected) {
                    return Err(ActorError::InputType {
                        actor: self.name.clone(),
                        input: port.name.clone(),
                        expected: expected.clone(),
                        actual: value.type_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_outputs(&self, outputs: &HashMap<String, Value>) -> Result<(), ActorError> {
        for port in self.definition.signature.outputs.values() {
            if port.nullable || !self.status.output_enabled(&port.name) {
                continue;
            }
            let produced = outputs.get(&port.name).map(|v| !v.is_null()).unwrap_or(false);
            if !produced {
                return Err(ActorError::NullOutput {
                    actor: self.name.clone(),
                    output: port.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Run one step over the currently bound inputs.
    ///
    /// A failed step leaves the actor steppable.
    pub async fn step(&mut self) -> Result<(), ActorError> {
        self.step_with(&HashMap::new()).await
    }

    /// Step with the enclosing node's variables visible to the body
    pub async fn step_with(&mut self, variables: &HashMap<String, Value>) -> Result<(), ActorError> {
        self.require("step", &[ActorState::Initialized, ActorState::Stepped])?;
        self.state = ActorState::Stepped;
        self.run_count += 1;
        self.status.reset_output_enables(&self.definition.signature);
        self.check_inputs()?;

        if self.hooks.set_status {
            self.body.set_status(&self.status);
        }
        if !self.hooks.step {
            self.outputs.clear();
            return Ok(());
        }

        let mut outputs = HashMap::new();
        let result = {
            let mut io = StepIo::new(
                &self.name,
                &self.inputs,
                &mut outputs,
                &mut self.state_values,
                &mut self.status,
                &self.definition.settings,
                variables,
            );
            self.body.step(&mut io).await
        };
        result.map_err(|e| self.runtime_error("step", e))?;
        self.check_outputs(&outputs)?;
        self.outputs = outputs;
        Ok(())
    }

    pub async fn wrapup(&mut self) -> Result<(), ActorError> {
        self.require(
            "wrap up",
            &[ActorState::Initialized, ActorState::Stepped, ActorState::WrappedUp],
        )?;
        if self.state == ActorState::WrappedUp {
            return Ok(());
        }
        self.state = ActorState::WrappedUp;
        if !self.hooks.wrapup {
            return Ok(());
        }
        let mut scratch = HashMap::new();
        let no_variables = HashMap::new();
        let result = {
            let mut io = StepIo::new(
                &self.name,
                &self.inputs,
                &mut scratch,
                &mut self.state_values,
                &mut self.status,
                &self.definition.settings,
                &no_variables,
            );
            self.body.wrapup(&mut io).await
        };
        result.map_err(|e| self.runtime_error("wrapup", e))
    }

    pub fn dispose(&mut self) -> Result<(), ActorError> {
        if self.state == ActorState::Disposed {
            return Ok(());
        }
        self.require("dispose", &[ActorState::WrappedUp])?;
        self.inputs.clear();
        self.outputs.clear();
        self.state = ActorState::Disposed;
        Ok(())
    }

    /// Return a wrapped-up or initialized actor to configured so it can be
    /// initialized again for a fresh run
    pub fn reset(&mut self) {
        if matches!(
            self.state,
            ActorState::Initialized | ActorState::Stepped | ActorState::WrappedUp
        ) {
            self.state = ActorState::Configured;
        }
        self.run_count = 0;
        self.inputs.clear();
        self.outputs.clear();
    }

    /// Produce an independent actor with the same definition.
    ///
    /// Only an initialized actor may be cloned. The clone starts at
    /// CONSTRUCTED carrying copies of the bound inputs, state and status;
    /// [`Actor::activate_clone`] brings it to INITIALIZED. On failure
    /// `self` is left untouched.
    pub fn clone_actor(&self) -> Result<Actor, ActorError> {
        if self.state != ActorState::Initialized {
            return Err(ActorError::Clone {
                actor: self.name.clone(),
                reason: format!("actor is {} rather than INITIALIZED", self.state),
            });
        }

        let (body, fresh_body) = match self.body.duplicate() {
            Some(body) => (body, false),
            None => match &self.definition.factory {
                Some(factory) => {
                    let body = factory().map_err(|e| ActorError::Clone {
                        actor: self.name.clone(),
                        reason: e.to_string(),
                    })?;
                    (body, true)
                }
                None => {
                    return Err(ActorError::Clone {
                        actor: self.name.clone(),
                        reason: "body cannot be duplicated and no factory is defined".to_string(),
                    })
                }
            },
        };

        Ok(Actor {
            name: self.name.clone(),
            definition: self.definition.clone(),
            state: ActorState::Constructed,
            body,
            hooks: ActorHooks::NONE,
            fresh_body,
            inputs: self.inputs.clone(),
            outputs: HashMap::new(),
            state_values: self.state_values.clone(),
            status: self.status.clone(),
            run_count: self.run_count,
        })
    }

    /// Walk a fresh clone through its lifecycle to INITIALIZED, keeping the
    /// inputs copied from the master. The initialize hook runs only when
    /// the body was newly built by the factory.
    pub async fn activate_clone(&mut self) -> Result<(), ActorError> {
        self.require("activate", &[ActorState::Constructed])?;
        self.state = ActorState::PropertiesSet;
        self.elaborate()?;
        self.configure()?;
        if self.fresh_body {
            self.run_initialize_hook().await?;
        }
        self.state = ActorState::Initialized;
        Ok(())
    }
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("run_count", &self.run_count)
            .finish()
    }
}
