use crate::actor::Actor;
use crate::{ActorError, FlowError, Result, StepError, Value};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

/// Variable bindings captured when a step is submitted
pub type Variables = HashMap<String, Value>;

/// The outcome of stepping one actor once.
///
/// Holds a snapshot of the outputs and output enables taken right after
/// the step, the variables bound at submission, and the captured error if
/// the step failed.
#[derive(Debug)]
pub struct ActorRunner {
    actor: Option<Actor>,
    actor_name: String,
    variables: Variables,
    outputs: HashMap<String, Value>,
    output_enables: HashMap<String, bool>,
    exception: Option<ActorError>,
    sequence: u64,
}

impl ActorRunner {
    fn capture(actor: &Actor, variables: Variables, outcome: std::result::Result<(), ActorError>, sequence: u64) -> Self {
        let (outputs, output_enables) = if outcome.is_ok() {
            (actor.outputs().clone(), actor.status().output_enables().clone())
        } else {
            (HashMap::new(), HashMap::new())
        };
        Self {
            actor: None,
            actor_name: actor.name().to_string(),
            variables,
            outputs,
            output_enables,
            exception: outcome.err(),
            sequence,
        }
    }

    async fn guarded_step(actor: &mut Actor, variables: &Variables) -> std::result::Result<(), ActorError> {
        match AssertUnwindSafe(actor.step_with(variables)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic".to_string());
                Err(ActorError::Runtime {
                    actor: actor.name().to_string(),
                    hook: "step",
                    source: StepError::Failed(format!("step panicked: {}", message)),
                })
            }
        }
    }

    /// Step `actor` on the caller's task; the actor is borrowed, not owned
    pub async fn run_in_place(actor: &mut Actor, variables: Variables) -> Self {
        let outcome = Self::guarded_step(actor, &variables).await;
        Self::capture(actor, variables, outcome, 0)
    }

    /// Step an owned actor instance, keeping it in the runner
    pub async fn execute(mut actor: Actor, variables: Variables, sequence: u64) -> Self {
        let outcome = Self::guarded_step(&mut actor, &variables).await;
        let mut runner = Self::capture(&actor, variables, outcome, sequence);
        runner.actor = Some(actor);
        runner
    }

    /// Begin stepping `actor` on its own task
    pub fn start(actor: Actor, variables: Variables) -> RunnerHandle {
        let actor_name = actor.name().to_string();
        tracing::trace!(actor = %actor_name, "runner started");
        RunnerHandle {
            actor_name,
            handle: tokio::spawn(Self::execute(actor, variables, 0)),
        }
    }

    pub fn actor_name(&self) -> &str {
        &self.actor_name
    }

    /// The stepped instance, when the runner owns one
    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn output_value(&self, label: &str) -> Option<&Value> {
        self.outputs.get(label)
    }

    pub fn outputs(&self) -> &HashMap<String, Value> {
        &self.outputs
    }

    pub fn output_enabled(&self, label: &str) -> bool {
        self.output_enables.get(label).copied().unwrap_or(true)
    }

    pub fn exception(&self) -> Option<&ActorError> {
        self.exception.as_ref()
    }

    pub fn take_exception(&mut self) -> Option<ActorError> {
        self.exception.take()
    }

    pub fn succeeded(&self) -> bool {
        self.exception.is_none()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// A runner executing on its own task
#[derive(Debug)]
pub struct RunnerHandle {
    actor_name: String,
    handle: JoinHandle<ActorRunner>,
}

impl RunnerHandle {
    pub fn actor_name(&self) -> &str {
        &self.actor_name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn wait_for_completion(self) -> Result<ActorRunner> {
        self.handle.await.map_err(|e| {
            FlowError::Execution(format!(
                "Runner for actor {} did not complete: {}",
                self.actor_name, e
            ))
        })
    }
}
