use super::status::ActorStatus;
use crate::{StepError, Value};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Which optional hooks an actor body implements.
///
/// Resolved once when the actor is configured; hooks that are absent are
/// never called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorHooks {
    pub initialize: bool,
    pub step: bool,
    pub wrapup: bool,
    pub set_status: bool,
}

impl ActorHooks {
    pub const NONE: ActorHooks = ActorHooks {
        initialize: false,
        step: false,
        wrapup: false,
        set_status: false,
    };

    pub const STEP_ONLY: ActorHooks = ActorHooks {
        initialize: false,
        step: true,
        wrapup: false,
        set_status: false,
    };

    /// Names of hooks present in `self` but missing from `available`
    pub fn missing_from(&self, available: &ActorHooks) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.initialize && !available.initialize {
            missing.push("initialize");
        }
        if self.step && !available.step {
            missing.push("step");
        }
        if self.wrapup && !available.wrapup {
            missing.push("wrapup");
        }
        if self.set_status && !available.set_status {
            missing.push("set_status");
        }
        missing
    }
}

impl Default for ActorHooks {
    fn default() -> Self {
        ActorHooks::STEP_ONLY
    }
}

/// View of an actor's data handed to its body during a hook
pub struct StepIo<'a> {
    actor: &'a str,
    inputs: &'a HashMap<String, Value>,
    outputs: &'a mut HashMap<String, Value>,
    state: &'a mut HashMap<String, Value>,
    status: &'a mut ActorStatus,
    settings: &'a BTreeMap<String, Value>,
    variables: &'a HashMap<String, Value>,
}

impl<'a> StepIo<'a> {
    pub(crate) fn new(
        actor: &'a str,
        inputs: &'a HashMap<String, Value>,
        outputs: &'a mut HashMap<String, Value>,
        state: &'a mut HashMap<String, Value>,
        status: &'a mut ActorStatus,
        settings: &'a BTreeMap<String, Value>,
        variables: &'a HashMap<String, Value>,
    ) -> Self {
        Self {
            actor,
            inputs,
            outputs,
            state,
            status,
            settings,
            variables,
        }
    }

    pub fn actor_name(&self) -> &str {
        self.actor
    }

    /// Get required input or return error
    pub fn input(&self, name: &str) -> Result<&Value, StepError> {
        self.inputs
            .get(name)
            .ok_or_else(|| StepError::MissingInput(name.to_string()))
    }

    pub fn optional_input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name).filter(|v| !v.is_null())
    }

    pub fn input_i64(&self, name: &str) -> Result<i64, StepError> {
        let value = self.input(name)?;
        value.as_i64().ok_or_else(|| StepError::InvalidInputType {
            field: name.to_string(),
            expected: "Integer".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    pub fn input_f64(&self, name: &str) -> Result<f64, StepError> {
        let value = self.input(name)?;
        value.as_f64().ok_or_else(|| StepError::InvalidInputType {
            field: name.to_string(),
            expected: "Number".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    pub fn input_str(&self, name: &str) -> Result<&str, StepError> {
        let value = self.input(name)?;
        value.as_str().ok_or_else(|| StepError::InvalidInputType {
            field: name.to_string(),
            expected: "String".to_string(),
            actual: value.type_name().to_string(),
        })
    }

    pub fn inputs(&self) -> &HashMap<String, Value> {
        self.inputs
    }

    pub fn setting(&self, name: &str) -> Option<&Value> {
        self.settings.get(name)
    }

    /// Variables of the enclosing node at the time the step was submitted
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn variables(&self) -> &HashMap<String, Value> {
        self.variables
    }

    pub fn set_output(&mut self, name: &str, value: impl Into<Value>) {
        self.outputs.insert(name.to_string(), value.into());
    }

    pub fn state(&self, name: &str) -> Option<&Value> {
        self.state.get(name)
    }

    pub fn set_state(&mut self, name: &str, value: impl Into<Value>) {
        self.state.insert(name.to_string(), value.into());
    }

    pub fn enable_input(&mut self, name: &str) {
        self.status.enable_input(name);
    }

    pub fn disable_input(&mut self, name: &str) {
        self.status.disable_input(name);
    }

    pub fn enable_output(&mut self, name: &str) {
        self.status.enable_output(name);
    }

    pub fn disable_output(&mut self, name: &str) {
        self.status.disable_output(name);
    }

    pub fn step_count(&self) -> u64 {
        self.status.step_count()
    }
}

/// The computation wrapped by an actor.
///
/// Bodies implement only the hooks they need and report them through
/// [`ActorBody::hooks`]. `duplicate` produces an independent copy for
/// concurrent stepping; bodies that cannot be copied return `None` and the
/// actor falls back to its factory.
#[async_trait]
pub trait ActorBody: Send + Sync {
    fn hooks(&self) -> ActorHooks {
        ActorHooks::STEP_ONLY
    }

    async fn initialize(&mut self, _io: &mut StepIo<'_>) -> Result<(), StepError> {
        Ok(())
    }

    async fn step(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError>;

    async fn wrapup(&mut self, _io: &mut StepIo<'_>) -> Result<(), StepError> {
        Ok(())
    }

    fn set_status(&mut self, _status: &ActorStatus) {}

    fn duplicate(&self) -> Option<Box<dyn ActorBody>> {
        None
    }
}

type StepFn = dyn Fn(&mut StepIo<'_>) -> Result<(), StepError> + Send + Sync;

/// Actor body backed by a plain step closure
#[derive(Clone)]
pub struct FnActor {
    step: Arc<StepFn>,
}

impl FnActor {
    pub fn new<F>(step: F) -> Self
    where
        F: Fn(&mut StepIo<'_>) -> Result<(), StepError> + Send + Sync + 'static,
    {
        Self {
            step: Arc::new(step),
        }
    }
}

impl fmt::Debug for FnActor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnActor")
    }
}

#[async_trait]
impl ActorBody for FnActor {
    async fn step(&mut self, io: &mut StepIo<'_>) -> Result<(), StepError> {
        (self.step)(io)
    }

    fn duplicate(&self) -> Option<Box<dyn ActorBody>> {
        Some(Box::new(self.clone()))
    }
}
