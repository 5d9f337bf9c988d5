use crate::actor::ActorState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    /// An operation was attempted in a lifecycle state that forbids it
    #[error("{0}")]
    IllegalState(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl FlowError {
    pub fn illegal_state(message: impl Into<String>) -> Self {
        FlowError::IllegalState(message.into())
    }
}

/// Error raised by an actor body from one of its hooks
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    /// A named exception kind; exception outflows route on the kind
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    #[error("Step failed: {0}")]
    Failed(String),
}

impl StepError {
    pub fn raise(kind: impl Into<String>, message: impl Into<String>) -> Self {
        StepError::Raised {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            StepError::MissingInput(_) => "MissingInput",
            StepError::InvalidInputType { .. } => "InvalidInputType",
            StepError::Raised { kind, .. } => kind,
            StepError::Failed(_) => "StepFailed",
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ActorError {
    #[error("Actor declaration error on {actor}: {message}")]
    Declaration { actor: String, message: String },

    #[error("Null value received on non-nullable input '{input}' of actor {actor}")]
    NullInput { actor: String, input: String },

    #[error("Null value produced on non-nullable output '{output}' of actor {actor}")]
    NullOutput { actor: String, output: String },

    #[error("Input '{input}' of actor {actor} expects {expected} but received {actual}")]
    InputType {
        actor: String,
        input: String,
        expected: String,
        actual: String,
    },

    #[error("Exception in {hook} of actor {actor}: {source}")]
    Runtime {
        actor: String,
        hook: &'static str,
        #[source]
        source: StepError,
    },

    #[error("cloning actor {actor} failed: {reason}")]
    Clone { actor: String, reason: String },

    #[error("Actor {actor} cannot {operation} while {state}")]
    IllegalState {
        actor: String,
        operation: &'static str,
        state: ActorState,
    },
}

impl ActorError {
    /// Kind name used to match exception outflows
    pub fn kind(&self) -> &str {
        match self {
            ActorError::Declaration { .. } => "Declaration",
            ActorError::NullInput { .. } => "NullInput",
            ActorError::NullOutput { .. } => "NullOutput",
            ActorError::InputType { .. } => "InputType",
            ActorError::Runtime { source, .. } => source.kind(),
            ActorError::Clone { .. } => "Clone",
            ActorError::IllegalState { .. } => "IllegalState",
        }
    }

    pub fn actor(&self) -> &str {
        match self {
            ActorError::Declaration { actor, .. }
            | ActorError::NullInput { actor, .. }
            | ActorError::NullOutput { actor, .. }
            | ActorError::InputType { actor, .. }
            | ActorError::Runtime { actor, .. }
            | ActorError::Clone { actor, .. }
            | ActorError::IllegalState { actor, .. } => actor,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum WorkflowError {
    #[error("Invalid workflow: {0}")]
    Invalid(String),

    /// Configuration failure whose message is reported verbatim
    #[error("{0}")]
    Configuration(String),

    #[error("Node declaration error on {node}: {message}")]
    NodeDeclaration { node: String, message: String },

    #[error("No outflow matching inflow expression for node {node}: {expression}")]
    UnboundInflow { node: String, expression: String },

    #[error("No protocol registered for scheme '{scheme}' used by {node}.{label}")]
    UnknownProtocol {
        node: String,
        label: String,
        scheme: String,
    },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Unknown actor type: {0}")]
    UnknownActorType(String),

    #[error("Node {0} was not initialized properly.")]
    NodeNotInitialized(String),

    #[error("Actor {actor} on node {node} threw an exception: {source}")]
    ActorException {
        node: String,
        actor: String,
        #[source]
        source: ActorError,
    },
}
